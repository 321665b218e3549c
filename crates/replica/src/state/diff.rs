use crate::entity::Entity;
use crate::net::{ComponentChanged, ComponentState, EntityState};
use crate::types::{NetId, Tick};

/// Minimal delta of `entity` since `since`, or `None` when nothing changed.
///
/// Components are visited in net id order. A component whose last modified
/// tick is zero still equals its prototype value and is never serialized.
/// When a component was both added and modified inside the window, the added
/// marker and its state are both emitted; receivers materialize the default
/// before applying the state.
pub fn diff(entity: &Entity, since: Tick) -> Option<EntityState> {
    let mut changes = Vec::new();
    let mut states = Vec::new();

    for component in entity.components() {
        let modified = component.last_modified_tick;
        let created = component.creation_tick;

        if component.net_synced && !component.deleted && !modified.is_zero() && modified >= since
        {
            states.push(ComponentState {
                net_id: component.net_id,
                data: component.data.clone(),
            });
        }

        if !component.deleted && !created.is_zero() && created >= since {
            changes.push(ComponentChanged::added(component.net_id));
        } else if component.deleted && modified >= since {
            changes.push(ComponentChanged::removed(component.net_id));
        }
    }

    let prototype = changes
        .iter()
        .any(|change| !change.deleted && change.net_id == NetId::METADATA)
        .then(|| entity.prototype().map(str::to_string))
        .flatten();

    let state = EntityState::new(entity.id(), prototype, changes, states);
    (!state.is_empty()).then_some(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec2;

    use super::*;
    use crate::config::ReplicationConfig;
    use crate::entity::{
        ComponentData, ComponentRegistry, Coordinates, EntityStore, Prototype, PrototypeSet,
        PropertyBag, PropertyValue, Registration,
    };
    use crate::types::MapId;

    const SCORE: NetId = NetId(30);
    const LOCAL_ONLY: NetId = NetId(31);

    fn store() -> EntityStore {
        let mut registry = ComponentRegistry::new();
        registry.register_properties("score", SCORE).unwrap();
        registry
            .register(
                Registration::new("local_only", LOCAL_ONLY, || {
                    ComponentData::Properties(PropertyBag::default())
                })
                .net_synced(false),
            )
            .unwrap();

        let prototypes = PrototypeSet::new().with(Prototype::new("marker"));
        EntityStore::new(
            Arc::new(registry),
            Arc::new(prototypes),
            ReplicationConfig::default(),
        )
    }

    fn spawn_at_tick(store: &mut EntityStore, tick: u32) -> crate::types::EntityId {
        store.set_tick(Tick(tick));
        store
            .spawn(Some("marker"), Coordinates::origin(MapId(0)))
            .unwrap()
    }

    #[test]
    fn untouched_entity_only_announces_itself() {
        let mut store = store();
        let id = spawn_at_tick(&mut store, 4);

        let state = diff(store.get(id).unwrap(), Tick(1)).unwrap();
        assert_eq!(
            state.changes(),
            [
                ComponentChanged::added(NetId::TRANSFORM),
                ComponentChanged::added(NetId::METADATA),
            ]
        );
        assert!(state.component_states.is_none());
        assert_eq!(state.prototype.as_deref(), Some("marker"));

        assert!(diff(store.get(id).unwrap(), Tick(5)).is_none());
    }

    #[test]
    fn moved_entity_window_selects_what_is_sent() {
        let mut store = store();
        let id = spawn_at_tick(&mut store, 10);

        store.set_tick(Tick(12));
        store.set_position(id, Vec2::new(5.0, 5.0)).unwrap();
        let entity = store.get(id).unwrap();

        let recent = diff(entity, Tick(11)).unwrap();
        assert!(recent.changes().is_empty());
        assert!(recent.prototype.is_none());
        assert_eq!(recent.states().len(), 1);
        let transform = recent.states()[0].data.as_transform().unwrap();
        assert_eq!(transform.local_position(), Vec2::new(5.0, 5.0));

        let full = diff(entity, Tick(9)).unwrap();
        assert_eq!(
            full.changes(),
            [
                ComponentChanged::added(NetId::TRANSFORM),
                ComponentChanged::added(NetId::METADATA),
            ]
        );
        assert_eq!(full.states().len(), 1);
        assert_eq!(full.states()[0].net_id, NetId::TRANSFORM);
        assert_eq!(full.prototype.as_deref(), Some("marker"));
    }

    #[test]
    fn removed_components_are_reported_until_acknowledged() {
        let mut store = store();
        let id = spawn_at_tick(&mut store, 2);

        store.set_tick(Tick(3));
        store.add_component(id, SCORE).unwrap();
        store
            .modify_component(id, SCORE, |data| {
                if let Some(bag) = data.as_properties_mut() {
                    bag.set("points", PropertyValue::Int(7));
                }
            })
            .unwrap();

        let added = diff(store.get(id).unwrap(), Tick(3)).unwrap();
        assert_eq!(added.changes(), [ComponentChanged::added(SCORE)]);
        assert_eq!(added.states()[0].net_id, SCORE);

        store.set_tick(Tick(5));
        assert!(store.remove_component(id, SCORE).unwrap());
        let removed = diff(store.get(id).unwrap(), Tick(4)).unwrap();
        assert_eq!(removed.changes(), [ComponentChanged::removed(SCORE)]);
        assert!(removed.component_states.is_none());

        assert!(diff(store.get(id).unwrap(), Tick(6)).is_none());
    }

    #[test]
    fn local_components_never_carry_state() {
        let mut store = store();
        let id = spawn_at_tick(&mut store, 1);

        store.set_tick(Tick(2));
        store.add_component(id, LOCAL_ONLY).unwrap();
        store
            .modify_component(id, LOCAL_ONLY, |data| {
                if let Some(bag) = data.as_properties_mut() {
                    bag.set("seen", PropertyValue::Bool(true));
                }
            })
            .unwrap();

        let state = diff(store.get(id).unwrap(), Tick(2)).unwrap();
        assert_eq!(state.changes(), [ComponentChanged::added(LOCAL_ONLY)]);
        assert!(state.states().is_empty());
    }
}
