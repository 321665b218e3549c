use std::collections::BTreeMap;

use super::component::{CollidableState, Component, ComponentData, MetaDataState, TransformState};
use crate::types::{EntityId, NetId, Tick};

/// Slot index plus generation. A handle outlives its entity safely: once
/// the slot is recycled the generation no longer matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) handle: EntityHandle,
    pub(crate) prototype: Option<String>,
    pub(crate) components: BTreeMap<NetId, Component>,
    pub(crate) creation_tick: Tick,
    pub(crate) last_modified_tick: Tick,
    pub(crate) deleted: bool,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        handle: EntityHandle,
        prototype: Option<String>,
        tick: Tick,
    ) -> Self {
        Self {
            id,
            handle,
            prototype,
            components: BTreeMap::new(),
            creation_tick: tick,
            last_modified_tick: tick,
            deleted: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    pub fn prototype(&self) -> Option<&str> {
        self.prototype.as_deref()
    }

    pub fn creation_tick(&self) -> Tick {
        self.creation_tick
    }

    /// Latest tick at which any component changed, was added or removed.
    pub fn last_modified_tick(&self) -> Tick {
        self.last_modified_tick
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Attached components, removed ones included, in net id order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn component(&self, net_id: NetId) -> Option<&Component> {
        self.components.get(&net_id).filter(|c| c.is_live())
    }

    pub fn has_component(&self, net_id: NetId) -> bool {
        self.component(net_id).is_some()
    }

    pub fn data(&self, net_id: NetId) -> Option<&ComponentData> {
        self.component(net_id).map(|c| &c.data)
    }

    pub fn transform(&self) -> Option<&TransformState> {
        self.data(NetId::TRANSFORM)?.as_transform()
    }

    pub fn metadata(&self) -> Option<&MetaDataState> {
        self.data(NetId::METADATA)?.as_metadata()
    }

    pub fn collidable(&self) -> Option<&CollidableState> {
        self.data(NetId::COLLIDABLE)?.as_collidable()
    }

    pub fn name(&self) -> &str {
        self.metadata().map(|m| m.name.as_str()).unwrap_or_default()
    }

    pub(crate) fn component_mut(&mut self, net_id: NetId) -> Option<&mut Component> {
        self.components.get_mut(&net_id).filter(|c| c.is_live())
    }

    pub(crate) fn mark_modified(&mut self, tick: Tick) {
        if tick > self.last_modified_tick {
            self.last_modified_tick = tick;
        }
    }

    pub(crate) fn clear_ticks(&mut self) {
        for component in self.components.values_mut() {
            component.clear_ticks();
        }
    }

    /// Drops removed components nobody can still need a removal notice for.
    pub(crate) fn purge_removed(&mut self, up_to: Tick) {
        self.components
            .retain(|_, c| !(c.deleted && c.last_modified_tick <= up_to));
    }
}
