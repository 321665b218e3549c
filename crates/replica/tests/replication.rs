use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec2;
use replica::net::DeletionEntry;
use replica::{
    Box2, ChannelTransport, ComponentRegistry, Coordinates, DeliveryChannel, EntityId,
    EntityStore, GameState, MapId, MessageOutcome, MirrorState, NetId, PropertyValue, Prototype,
    PrototypeSet, ReplicationClient, ReplicationConfig, ReplicationHost, StateCodec, Tick,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_store() -> EntityStore {
    store_with(ReplicationConfig::default())
}

fn store_with(config: ReplicationConfig) -> EntityStore {
    let prototypes = PrototypeSet::new().with(
        Prototype::new("crate").with_name("Crate").with_component(
            "collidable",
            [
                ("half_extents", PropertyValue::Vec2([1.0, 0.5])),
                ("hard", PropertyValue::Bool(true)),
            ],
        ),
    );
    EntityStore::new(
        Arc::new(ComponentRegistry::new()),
        Arc::new(prototypes),
        config,
    )
}

fn host() -> ReplicationHost<ChannelTransport> {
    ReplicationHost::new(
        new_store(),
        StateCodec::default(),
        ChannelTransport::default(),
        30,
        4,
    )
}

fn at(x: f32, y: f32) -> Coordinates {
    Coordinates::Map {
        map: MapId(1),
        position: Vec2::new(x, y),
    }
}

fn encode(store: &EntityStore, from: Tick, to: Tick) -> Vec<u8> {
    let state = GameState::new(
        from,
        to,
        store.entity_states(from),
        store.deleted_entities(from),
    );
    StateCodec::default().encode(&state).unwrap().bytes
}

/// Creation message at tick 1 and a move-only message at tick 2.
fn creation_and_move() -> (EntityId, Vec<u8>, Vec<u8>) {
    let mut authority = new_store();
    let id = authority.spawn(Some("crate"), at(2.0, 3.0)).unwrap();
    let creation = encode(&authority, Tick(1), Tick(1));

    authority.set_tick(Tick(2));
    authority.set_position(id, Vec2::new(8.0, 1.0)).unwrap();
    let moved = encode(&authority, Tick(2), Tick(2));
    (id, creation, moved)
}

#[test]
fn host_replicates_lifecycle_to_client() {
    init_logging();

    let mut host = ReplicationHost::new(
        new_store(),
        StateCodec::default(),
        ChannelTransport::default(),
        30,
        4,
    );
    let (mut client, ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let peer = host.add_peer().unwrap();
    host.transport_mut().connect(peer, ingress);

    let id = host.store_mut().spawn(Some("crate"), at(2.0, 3.0)).unwrap();
    assert_eq!(host.update(Duration::from_millis(100)), 3);

    let now = Instant::now();
    client.process(1.0 / 30.0, now);
    assert_eq!(client.stats().messages_received, 3);
    assert_eq!(client.last_applied_tick(), Tick(3));
    assert_eq!(client.mirror_state(id), MirrorState::Live);
    assert_eq!(client.store().world_position(id), Some(Vec2::new(2.0, 3.0)));
    assert_eq!(client.store().world_aabb(id), host.store().world_aabb(id));
    assert_eq!(
        client.store().get(id).unwrap().prototype(),
        Some("crate")
    );
    host.acknowledge(peer, client.last_applied_tick());

    host.store_mut().set_position(id, Vec2::new(8.0, 1.0)).unwrap();
    host.tick_once();
    client.process(1.0 / 30.0, now);
    assert_eq!(client.store().world_position(id), Some(Vec2::new(8.0, 1.0)));
    host.acknowledge(peer, client.last_applied_tick());

    host.store_mut().delete(id);
    host.tick_once();
    assert!(!host.store().contains(id));
    assert_eq!(host.store().history().len(), 1);

    client.process(1.0 / 30.0, now);
    assert_eq!(client.mirror_state(id), MirrorState::Deleted);
    assert!(client.store().is_empty());
    assert!(client.store().history().is_empty());

    host.acknowledge(peer, client.last_applied_tick());
    host.tick_once();
    assert!(host.store().history().is_empty());
    assert_eq!(host.stats().messages_sent, 6);
    assert_eq!(host.stats().send_failures, 0);
}

#[test]
fn late_joiner_receives_current_state() {
    init_logging();

    let mut host = ReplicationHost::new(
        new_store(),
        StateCodec::default(),
        ChannelTransport::default(),
        60,
        4,
    );
    let mover = host.store_mut().spawn(Some("crate"), at(0.0, 0.0)).unwrap();
    let idle = host.store_mut().spawn(None, at(-4.0, 4.0)).unwrap();
    host.add_system(move |store: &mut EntityStore, _dt: f32| {
        if let Some(position) = store.world_position(mover) {
            let _ = store.set_position(mover, position + Vec2::X);
        }
    });

    for _ in 0..5 {
        host.tick_once();
    }

    let (mut client, ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let peer = host.add_peer().unwrap();
    host.transport_mut().connect(peer, ingress);
    host.tick_once();
    client.process(1.0 / 60.0, Instant::now());

    for id in [mover, idle] {
        assert_eq!(client.mirror_state(id), MirrorState::Live);
        assert_eq!(
            client.store().world_position(id),
            host.store().world_position(id)
        );
    }
    assert_eq!(
        client.store().world_position(mover),
        Some(Vec2::new(6.0, 0.0))
    );
    assert!(client.store().get(idle).unwrap().prototype().is_none());
}

#[test]
fn deletion_history_waits_for_every_peer() {
    let mut host = ReplicationHost::new(
        new_store(),
        StateCodec::default(),
        ChannelTransport::default(),
        30,
        4,
    );
    let (mut fast, fast_ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let (_slow, slow_ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let a = host.add_peer().unwrap();
    let b = host.add_peer().unwrap();
    host.transport_mut().connect(a, fast_ingress);
    host.transport_mut().connect(b, slow_ingress);

    let id = host.store_mut().spawn(None, at(1.0, 1.0)).unwrap();
    host.tick_once();
    host.store_mut().delete(id);
    host.tick_once();

    fast.process(0.0, Instant::now());
    assert_eq!(fast.mirror_state(id), MirrorState::Deleted);
    host.acknowledge(a, fast.last_applied_tick());
    host.tick_once();
    assert_eq!(host.store().history().len(), 1);

    host.acknowledge(b, Tick(2));
    host.tick_once();
    assert!(host.store().history().is_empty());
}

#[test]
fn buffered_state_applies_once_creation_arrives() {
    init_logging();
    let (id, creation, moved) = creation_and_move();
    let (mut client, _ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let t0 = Instant::now();

    assert_eq!(client.handle_message(&moved, t0), MessageOutcome::Applied(Tick(2)));
    assert_eq!(client.mirror_state(id), MirrorState::Pending);
    assert_eq!(client.store().incoming().len(), 1);

    let later = t0 + Duration::from_secs(1);
    assert_eq!(client.handle_message(&creation, later), MessageOutcome::Late(Tick(1)));
    assert_eq!(client.mirror_state(id), MirrorState::Live);
    assert_eq!(client.store().world_position(id), Some(Vec2::new(2.0, 3.0)));

    let drained = client.process(0.0, t0 + Duration::from_secs(2));
    assert_eq!(drained.applied, 1);
    assert_eq!(drained.pending, 0);
    assert_eq!(client.store().world_position(id), Some(Vec2::new(8.0, 1.0)));
    assert_eq!(client.store().current_tick(), Tick(2));
}

#[test]
fn buffered_state_expires_without_creation() {
    init_logging();
    let (id, creation, moved) = creation_and_move();
    let (mut client, _ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let t0 = Instant::now();

    client.handle_message(&moved, t0);
    let late = t0 + Duration::from_secs(6);
    client.handle_message(&creation, late);

    let drained = client.process(0.0, late);
    assert_eq!(drained.expired, 1);
    assert_eq!(drained.applied, 0);
    assert!(client.store().incoming().is_empty());
    assert_eq!(client.stats().buffered_expired, 1);
    assert_eq!(client.store().world_position(id), Some(Vec2::new(2.0, 3.0)));
}

#[test]
fn late_messages_never_roll_back() {
    let (id, creation, moved) = creation_and_move();
    let (mut client, _ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let now = Instant::now();

    assert_eq!(client.handle_message(&creation, now), MessageOutcome::Applied(Tick(1)));
    assert_eq!(client.handle_message(&moved, now), MessageOutcome::Applied(Tick(2)));
    assert_eq!(client.handle_message(&creation, now), MessageOutcome::Late(Tick(1)));

    assert_eq!(client.store().world_position(id), Some(Vec2::new(8.0, 1.0)));
    assert_eq!(client.last_applied_tick(), Tick(2));
    assert_eq!(client.stats().stale_received, 1);
}

#[test]
fn repeated_deletion_is_idempotent() {
    let (id, creation, moved) = creation_and_move();
    let (mut client, _ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let now = Instant::now();
    client.handle_message(&creation, now);

    let entry = DeletionEntry {
        tick: Tick(2),
        entity_id: id,
    };
    assert!(client.store_mut().apply_deletion(entry));
    client.process(0.0, now);
    let len = client.store().len();
    let map_entries = client.store().spatial().len();

    assert!(!client.store_mut().apply_deletion(entry));
    client.process(0.0, now);
    assert_eq!(client.store().len(), len);
    assert_eq!(client.store().spatial().len(), map_entries);
    assert_eq!(client.mirror_state(id), MirrorState::Deleted);

    // Deltas for a tombstoned entity are ignored rather than buffered.
    client.handle_message(&moved, now);
    assert!(client.store().incoming().is_empty());
    assert!(!client.store().contains(id));
}

#[test]
fn malformed_messages_are_dropped() {
    let (mut client, ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    assert_eq!(
        client.handle_message(&[0x03, 0x01], Instant::now()),
        MessageOutcome::Malformed
    );

    ingress.push(DeliveryChannel::Unreliable, vec![0xff; 8]);
    client.process(0.0, Instant::now());

    assert_eq!(client.stats().malformed_received, 2);
    assert_eq!(client.last_applied_tick(), Tick::ZERO);
    assert!(client.store().is_empty());
}

#[test]
fn children_follow_their_parent_on_mirrors() {
    init_logging();
    let mut host = host();
    let (mut client, ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let peer = host.add_peer().unwrap();
    host.transport_mut().connect(peer, ingress);

    let parent = host.store_mut().spawn(None, at(10.0, 0.0)).unwrap();
    let child = host
        .store_mut()
        .spawn(
            None,
            Coordinates::Parent {
                parent,
                position: Vec2::new(1.0, 0.0),
            },
        )
        .unwrap();
    host.tick_once();
    client.process(0.0, Instant::now());
    host.acknowledge(peer, client.last_applied_tick());
    assert_eq!(client.store().children_of(parent), [child]);

    host.store_mut().set_position(parent, Vec2::new(20.0, 0.0)).unwrap();
    host.tick_once();
    client.process(0.0, Instant::now());

    let near = Box2::centered(Vec2::new(21.0, 0.0), Vec2::splat(0.01));
    for store in [host.store(), client.store()] {
        assert_eq!(store.entities_intersecting(MapId(1), &near, false), [child]);
        assert_eq!(store.world_position(child), Some(Vec2::new(21.0, 0.0)));
    }
    assert_eq!(client.store().world_aabb(child), host.store().world_aabb(child));
}

#[test]
fn late_joiner_skips_components_removed_before_it_joined() {
    init_logging();
    let mut host = host();
    let id = host.store_mut().spawn(Some("crate"), at(2.0, 3.0)).unwrap();
    host.tick_once();

    host.store_mut().remove_component(id, NetId::COLLIDABLE).unwrap();
    host.tick_once();
    // Nobody was connected, so the removal is already forgotten.
    assert!(
        host.store()
            .get(id)
            .unwrap()
            .components()
            .all(|component| component.net_id != NetId::COLLIDABLE)
    );

    let (mut client, ingress) = ReplicationClient::new(new_store(), StateCodec::default());
    let peer = host.add_peer().unwrap();
    host.transport_mut().connect(peer, ingress);
    host.tick_once();
    client.process(0.0, Instant::now());

    let mirrored = client.store().get(id).unwrap();
    assert_eq!(mirrored.prototype(), Some("crate"));
    assert!(mirrored.collidable().is_none());
    assert_eq!(client.store().world_aabb(id), host.store().world_aabb(id));
    assert_eq!(
        client.store().world_aabb(id),
        Some(Box2::from_point(Vec2::new(2.0, 3.0)))
    );
}

#[test]
fn tombstones_are_forgotten_after_retention() {
    let (id, creation, moved) = creation_and_move();
    let config = ReplicationConfig {
        tombstone_retention: 10,
        ..Default::default()
    };
    let (mut client, _ingress) = ReplicationClient::new(store_with(config), StateCodec::default());
    let now = Instant::now();
    client.handle_message(&creation, now);

    client.store_mut().apply_deletion(DeletionEntry {
        tick: Tick(1),
        entity_id: id,
    });
    client.process(0.0, now);
    assert_eq!(client.mirror_state(id), MirrorState::Deleted);

    client.store_mut().set_tick(Tick(11));
    client.process(0.0, now);
    assert_eq!(client.mirror_state(id), MirrorState::Deleted);
    client.handle_message(&moved, now);
    assert!(client.store().incoming().is_empty());

    client.store_mut().set_tick(Tick(12));
    client.process(0.0, now);
    assert_eq!(client.mirror_state(id), MirrorState::Unknown);
    assert!(!client.store().contains(id));
}

#[test]
fn buffered_state_expires_from_receipt_time() {
    let (id, _creation, moved) = creation_and_move();
    let (mut client, ingress) = ReplicationClient::new(new_store(), StateCodec::default());

    assert!(ingress.push(DeliveryChannel::Unreliable, moved));
    let drained = client.process(0.0, Instant::now() + Duration::from_secs(6));

    assert_eq!(drained.expired, 1);
    assert_eq!(client.mirror_state(id), MirrorState::Unknown);
    assert_eq!(client.stats().buffered_expired, 1);
}
