use std::f32::consts::TAU;

use glam::Vec2;
use log::warn;

use replica::{
    ComponentError, ComponentRegistry, Coordinates, Entity, EntityError, EntityId, EntityStore,
    EntitySystem, MapId, NetId, PropertyValue, Prototype, PrototypeSet,
};

pub const BALLISTIC: NetId = NetId::FIRST_CUSTOM;
pub const ARENA: MapId = MapId(1);

const GRAVITY: f32 = 9.8;
const LAUNCH_SPEED: f32 = 12.0;
const PROJECTILE_LIFETIME: i64 = 240;

pub fn demo_registry() -> Result<ComponentRegistry, ComponentError> {
    let mut registry = ComponentRegistry::new();
    registry.register_properties("ballistic", BALLISTIC)?;
    Ok(registry)
}

pub fn demo_prototypes() -> PrototypeSet {
    PrototypeSet::new()
        .with(
            Prototype::new("projectile")
                .with_name("Projectile")
                .with_component(
                    "collidable",
                    [("half_extents", PropertyValue::Vec2([0.25, 0.25]))],
                )
                .with_component(
                    "ballistic",
                    [("lifetime", PropertyValue::Int(PROJECTILE_LIFETIME))],
                ),
        )
        .with(
            Prototype::new("crate").with_name("Crate").with_component(
                "collidable",
                [
                    ("half_extents", PropertyValue::Vec2([1.0, 1.0])),
                    ("hard", PropertyValue::Bool(true)),
                ],
            ),
        )
}

/// A ring of crates around the launch point.
pub fn spawn_scenery(store: &mut EntityStore) -> Result<Vec<EntityId>, EntityError> {
    (0..8)
        .map(|i| {
            let position = Vec2::from_angle(i as f32 * TAU / 8.0) * 18.0 + Vec2::Y * 6.0;
            store.spawn(
                Some("crate"),
                Coordinates::Map {
                    map: ARENA,
                    position,
                },
            )
        })
        .collect()
}

/// Launches a projectile every `interval` ticks, rotating the direction.
#[derive(Debug, Default)]
pub struct Spawner {
    interval: u32,
    elapsed: u32,
    launched: u64,
}

impl Spawner {
    pub fn new(interval: u32) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }
}

impl EntitySystem for Spawner {
    fn name(&self) -> &str {
        "spawner"
    }

    fn update(&mut self, store: &mut EntityStore, _frame_time: f32) {
        if self.interval == 0 {
            return;
        }
        self.elapsed += 1;
        if self.elapsed < self.interval {
            return;
        }
        self.elapsed = 0;

        let id = match store.spawn(Some("projectile"), Coordinates::origin(ARENA)) {
            Ok(id) => id,
            Err(err) => {
                warn!("spawner: {err}");
                return;
            }
        };
        let angle = (self.launched % 16) as f32 * TAU / 16.0;
        let velocity = Vec2::from_angle(angle) * LAUNCH_SPEED + Vec2::Y * 4.0;
        let _ = store.modify_component(id, BALLISTIC, |data| {
            if let Some(bag) = data.as_properties_mut() {
                bag.set("velocity", PropertyValue::Vec2(velocity.to_array()));
            }
        });
        self.launched += 1;
    }
}

/// Integrates projectiles and removes them when they expire, fall below
/// the floor or hit something hard.
pub fn ballistics(store: &mut EntityStore, dt: f32) {
    for id in store.entities_with(BALLISTIC) {
        let Some(bag) = store.component(id, BALLISTIC).and_then(|data| data.as_properties())
        else {
            continue;
        };
        let velocity = bag
            .get("velocity")
            .and_then(PropertyValue::as_vec2)
            .unwrap_or(Vec2::ZERO);
        let lifetime = bag
            .get("lifetime")
            .and_then(PropertyValue::as_int)
            .unwrap_or(0);
        let Some(position) = store.world_position(id) else {
            continue;
        };

        if lifetime <= 0 || position.y < -20.0 {
            store.delete(id);
            continue;
        }

        let velocity = velocity - Vec2::Y * GRAVITY * dt;
        let _ = store.modify_component(id, BALLISTIC, |data| {
            if let Some(bag) = data.as_properties_mut() {
                bag.set("velocity", PropertyValue::Vec2(velocity.to_array()));
                bag.set("lifetime", PropertyValue::Int(lifetime - 1));
            }
        });
        let _ = store.set_position(id, position + velocity * dt);

        let hit = store
            .entities_intersecting_entity(id, false)
            .into_iter()
            .any(|other| {
                store
                    .get(other)
                    .and_then(Entity::collidable)
                    .is_some_and(|shape| shape.hard)
            });
        if hit {
            store.delete(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use replica::ReplicationConfig;

    use super::*;

    fn store() -> EntityStore {
        EntityStore::new(
            Arc::new(demo_registry().unwrap()),
            Arc::new(demo_prototypes()),
            ReplicationConfig::default(),
        )
    }

    #[test]
    fn spawner_launches_on_interval() {
        let mut store = store();
        let mut spawner = Spawner::new(3);
        for _ in 0..7 {
            spawner.update(&mut store, 1.0 / 60.0);
        }
        assert_eq!(store.entities_with(BALLISTIC).len(), 2);
    }

    #[test]
    fn projectiles_expire() {
        let mut store = store();
        let mut spawner = Spawner::new(1);
        spawner.update(&mut store, 0.0);
        let id = store.entities_with(BALLISTIC)[0];

        for _ in 0..=PROJECTILE_LIFETIME {
            ballistics(&mut store, 0.0);
        }
        assert!(!store.contains(id));
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn crates_stop_projectiles() {
        let mut store = store();
        let crates = spawn_scenery(&mut store).unwrap();
        assert_eq!(crates.len(), 8);

        let position = store.world_position(crates[0]).unwrap();
        let id = store
            .spawn(Some("projectile"), Coordinates::Map { map: ARENA, position })
            .unwrap();
        ballistics(&mut store, 1.0 / 60.0);
        assert!(!store.contains(id));
        assert!(store.contains(crates[0]));
    }
}
