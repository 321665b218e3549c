use rkyv::{Archive, Deserialize, Serialize};

use crate::entity::ComponentData;
use crate::types::{EntityId, NetId, Tick};

/// A component was attached (`deleted == false`) or detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ComponentChanged {
    pub deleted: bool,
    pub net_id: NetId,
}

impl ComponentChanged {
    pub fn added(net_id: NetId) -> Self {
        Self {
            deleted: false,
            net_id,
        }
    }

    pub fn removed(net_id: NetId) -> Self {
        Self {
            deleted: true,
            net_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ComponentState {
    pub net_id: NetId,
    pub data: ComponentData,
}

/// Delta for one entity. Empty lists travel as `None`, and `None` means
/// "nothing changed", never "clear".
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntityState {
    pub entity_id: EntityId,
    /// Set alongside an added metadata marker so the receiver can build the
    /// entity from the same prototype.
    pub prototype: Option<String>,
    pub component_changes: Option<Vec<ComponentChanged>>,
    pub component_states: Option<Vec<ComponentState>>,
}

impl EntityState {
    pub fn new(
        entity_id: EntityId,
        prototype: Option<String>,
        changes: Vec<ComponentChanged>,
        states: Vec<ComponentState>,
    ) -> Self {
        Self {
            entity_id,
            prototype,
            component_changes: (!changes.is_empty()).then_some(changes),
            component_states: (!states.is_empty()).then_some(states),
        }
    }

    pub fn changes(&self) -> &[ComponentChanged] {
        self.component_changes.as_deref().unwrap_or_default()
    }

    pub fn states(&self) -> &[ComponentState] {
        self.component_states.as_deref().unwrap_or_default()
    }

    /// Carries the creation of the entity itself.
    pub fn is_creation(&self) -> bool {
        self.changes()
            .iter()
            .any(|change| !change.deleted && change.net_id == NetId::METADATA)
    }

    pub fn is_empty(&self) -> bool {
        self.changes().is_empty() && self.states().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct DeletionEntry {
    pub tick: Tick,
    pub entity_id: EntityId,
}

/// Body of a state message: everything that changed in `(from_tick, to_tick]`
/// from the point of view of one peer.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct GameState {
    pub from_tick: Tick,
    pub to_tick: Tick,
    pub entity_states: Option<Vec<EntityState>>,
    pub deleted_entities: Option<Vec<DeletionEntry>>,
}

impl GameState {
    pub fn new(
        from_tick: Tick,
        to_tick: Tick,
        entity_states: Vec<EntityState>,
        deleted_entities: Vec<DeletionEntry>,
    ) -> Self {
        Self {
            from_tick,
            to_tick,
            entity_states: (!entity_states.is_empty()).then_some(entity_states),
            deleted_entities: (!deleted_entities.is_empty()).then_some(deleted_entities),
        }
    }

    pub fn entity_states(&self) -> &[EntityState] {
        self.entity_states.as_deref().unwrap_or_default()
    }

    pub fn deleted_entities(&self) -> &[DeletionEntry] {
        self.deleted_entities.as_deref().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_states().is_empty() && self.deleted_entities().is_empty()
    }
}
