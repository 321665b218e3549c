use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use log::{debug, trace, warn};

use super::component::{Component, ComponentData, TransformState};
use super::entity::{Entity, EntityHandle};
use super::error::{ComponentError, EntityError};
use super::prototype::PrototypeResolver;
use super::registry::{ComponentRegistry, HookFn, Registration};
use super::system::EntitySystem;
use crate::config::ReplicationConfig;
use crate::net::{DeletionEntry, DrainReport, EntityState, IncomingBuffer};
use crate::spatial::{Box2, SpatialIndex};
use crate::state::{self, DeletionHistory};
use crate::types::{EntityId, MapId, NetId, Tick};

/// Where a freshly spawned entity is placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinates {
    Map { map: MapId, position: Vec2 },
    /// Position is local to the parent; the entity follows the parent's map.
    Parent { parent: EntityId, position: Vec2 },
}

impl Coordinates {
    pub fn origin(map: MapId) -> Self {
        Self::Map {
            map,
            position: Vec2::ZERO,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Owns every entity of one simulation. Single writer: all mutation happens
/// on the simulation thread, and other threads only hand messages in.
///
/// Deletion marks an entity and leaves it in storage until the cull pass at
/// the end of [`update`](Self::update), so systems can delete while they
/// iterate.
pub struct EntityStore {
    pub(crate) registry: Arc<ComponentRegistry>,
    prototypes: Arc<dyn PrototypeResolver + Send + Sync>,
    pub(crate) config: ReplicationConfig,
    current_tick: Tick,

    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    ids: HashMap<EntityId, EntityHandle>,
    next_id: u32,
    pending_cull: Vec<EntityId>,
    children: HashMap<EntityId, Vec<EntityId>>,
    spatial: SpatialIndex<EntityId>,

    pub(crate) history: DeletionHistory,
    pub(crate) incoming: IncomingBuffer,
    /// Mirror side: ids deleted by the authority, with the tick we learned it.
    pub(crate) tombstones: HashMap<EntityId, Tick>,
}

impl EntityStore {
    pub fn new(
        registry: Arc<ComponentRegistry>,
        prototypes: Arc<dyn PrototypeResolver + Send + Sync>,
        config: ReplicationConfig,
    ) -> Self {
        let spatial = SpatialIndex::new(config.tree_margin, config.growth_policy());
        Self {
            registry,
            prototypes,
            config,
            current_tick: Tick::FIRST,
            slots: Vec::new(),
            free_slots: Vec::new(),
            ids: HashMap::new(),
            next_id: EntityId::FIRST.0,
            pending_cull: Vec::new(),
            children: HashMap::new(),
            spatial,
            history: DeletionHistory::new(),
            incoming: IncomingBuffer::new(),
            tombstones: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn prototypes(&self) -> &(dyn PrototypeResolver + Send + Sync) {
        self.prototypes.as_ref()
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn advance_tick(&mut self) -> Tick {
        self.current_tick = self.current_tick.next();
        self.current_tick
    }

    /// Mirrors follow the authority's clock.
    pub fn set_tick(&mut self, tick: Tick) {
        self.current_tick = tick;
    }

    pub fn spatial(&self) -> &SpatialIndex<EntityId> {
        &self.spatial
    }

    pub fn history(&self) -> &DeletionHistory {
        &self.history
    }

    pub fn incoming(&self) -> &IncomingBuffer {
        &self.incoming
    }

    // -- lifecycle ---------------------------------------------------------

    /// Allocates an entity with its transform and metadata attached and
    /// nothing else. Fails when `explicit_id` is still known to this store.
    pub fn allocate(
        &mut self,
        prototype: Option<&str>,
        explicit_id: Option<EntityId>,
    ) -> Result<EntityId, EntityError> {
        if let Some(name) = prototype {
            if self.prototypes.resolve(name).is_none() {
                return Err(EntityError::UnknownPrototype(name.to_string()));
            }
        }

        let transform = self.registry.lookup(NetId::TRANSFORM)?;
        let metadata = self.registry.lookup(NetId::METADATA)?;
        let tick = self.current_tick;
        let mut transform = Component::new(
            NetId::TRANSFORM,
            transform.net_synced,
            (transform.construct)(),
            tick,
        );
        let mut metadata =
            Component::new(NetId::METADATA, metadata.net_synced, (metadata.construct)(), tick);
        transform.clear_ticks();
        if let Some(state) = metadata.data.as_metadata_mut() {
            state.prototype = prototype.map(str::to_string);
        }
        metadata.clear_ticks();

        let id = match explicit_id {
            Some(id) => {
                if self.ids.contains_key(&id) || self.tombstones.contains_key(&id) {
                    return Err(EntityError::DuplicateId(id));
                }
                self.next_id = self.next_id.max(id.0.saturating_add(1));
                id
            }
            None => {
                let id = EntityId(self.next_id);
                self.next_id = self.next_id.saturating_add(1);
                id
            }
        };

        let handle = self.reserve_slot();
        let mut entity = Entity::new(id, handle, prototype.map(str::to_string), tick);
        entity.components.insert(NetId::TRANSFORM, transform);
        entity.components.insert(NetId::METADATA, metadata);
        self.slots[handle.index as usize].entity = Some(entity);
        self.ids.insert(id, handle);
        self.resync(id);

        trace!("allocated {id} ({prototype:?}) at tick {tick}");
        Ok(id)
    }

    /// Allocates and loads every component the prototype declares. On failure
    /// the entity is gone again before the error is returned.
    pub fn create_from_prototype(
        &mut self,
        prototype: Option<&str>,
        explicit_id: Option<EntityId>,
    ) -> Result<EntityId, EntityError> {
        let id = self.allocate(prototype, explicit_id)?;
        let Some(name) = prototype else {
            return Ok(id);
        };

        match self.load_prototype(id, name) {
            Ok(()) => Ok(id),
            Err(source) => {
                self.teardown(id);
                Err(EntityError::Creation {
                    id,
                    prototype: Some(name.to_string()),
                    source,
                })
            }
        }
    }

    /// Creates the entity, places it, runs initialize then startup hooks and
    /// indexes it. Hook failures tear the entity down like load failures.
    pub fn spawn(
        &mut self,
        prototype: Option<&str>,
        coordinates: Coordinates,
    ) -> Result<EntityId, EntityError> {
        if let Coordinates::Parent { parent, .. } = coordinates {
            if !self.contains(parent) {
                return Err(EntityError::UnknownEntity(parent));
            }
        }

        let id = self.create_from_prototype(prototype, None)?;
        self.attach_coordinates(id, coordinates);

        if let Err(source) = self.initialize_entity(id) {
            self.teardown(id);
            return Err(EntityError::Creation {
                id,
                prototype: prototype.map(str::to_string),
                source,
            });
        }

        self.resync(id);
        debug!("spawned {id} ({prototype:?}) at tick {}", self.current_tick);
        Ok(id)
    }

    /// Marks the entity and its children deleted and records the deletion.
    /// Unknown or already deleted ids are ignored.
    pub fn delete(&mut self, id: EntityId) {
        self.delete_entity(id, true);
    }

    pub(crate) fn delete_entity(&mut self, id: EntityId, record: bool) {
        let tick = self.current_tick;
        let Some(entity) = self.live_mut(id) else {
            return;
        };
        entity.deleted = true;
        entity.mark_modified(tick);
        self.pending_cull.push(id);
        if record {
            self.history.record(tick, id);
        }
        trace!("deleted {id} at tick {tick}");

        if let Some(children) = self.children.get(&id).cloned() {
            for child in children {
                self.delete_entity(child, record);
            }
        }
    }

    /// One simulation step: apply buffered state, run systems, cull.
    pub fn update(
        &mut self,
        frame_time: f32,
        systems: &mut [Box<dyn EntitySystem>],
    ) -> DrainReport {
        self.update_at(Instant::now(), frame_time, systems)
    }

    pub fn update_at(
        &mut self,
        now: Instant,
        frame_time: f32,
        systems: &mut [Box<dyn EntitySystem>],
    ) -> DrainReport {
        let drained = self.process_message_buffer(now);
        for system in systems.iter_mut() {
            system.update(self, frame_time);
        }
        self.cull_deleted();
        drained
    }

    /// Physically removes entities deleted since the last pass. Deletion
    /// history is left alone.
    pub fn cull_deleted(&mut self) -> usize {
        let doomed = std::mem::take(&mut self.pending_cull);
        let count = doomed.len();
        for id in doomed {
            self.remove_storage(id);
        }

        let now = self.current_tick;
        let retention = self.config.tombstone_retention;
        self.tombstones
            .retain(|_, tick| now.0.saturating_sub(tick.0) <= retention);
        count
    }

    /// Drops every entity, buffered message and history entry. Ids are not
    /// handed out again afterwards.
    pub fn flush(&mut self) {
        self.slots.clear();
        self.free_slots.clear();
        self.ids.clear();
        self.pending_cull.clear();
        self.children.clear();
        self.spatial.clear();
        self.history.clear();
        self.incoming.clear();
        self.tombstones.clear();
    }

    // -- replication -------------------------------------------------------

    /// Deltas of every live entity changed at or after `since`, by id.
    pub fn entity_states(&self, since: Tick) -> Vec<EntityState> {
        let mut ids: Vec<EntityId> = self.ids.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.get(id))
            .filter(|entity| entity.last_modified_tick() >= since)
            .filter_map(|entity| state::diff(entity, since))
            .collect()
    }

    pub fn deleted_entities(&self, since: Tick) -> Vec<DeletionEntry> {
        self.history.since(since)
    }

    /// Forgets deletions and removed components at or before `up_to`, once
    /// every peer has acknowledged that far.
    pub fn cull_deletion_history(&mut self, up_to: Tick) -> usize {
        for slot in &mut self.slots {
            if let Some(entity) = slot.entity.as_mut() {
                entity.purge_removed(up_to);
            }
        }
        self.history.cull(up_to)
    }

    // -- lookup ------------------------------------------------------------

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.stored(id).filter(|e| !e.deleted)
    }

    pub fn get_by_handle(&self, handle: EntityHandle) -> Option<&Entity> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entity.as_ref().filter(|e| !e.deleted)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Live entity count.
    pub fn len(&self) -> usize {
        self.ids.len() - self.pending_cull.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live ids, safe to hold while deleting.
    pub fn live_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .ids
            .keys()
            .copied()
            .filter(|id| self.contains(*id))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entity.as_ref())
            .filter(|e| !e.deleted)
    }

    pub fn children_of(&self, id: EntityId) -> &[EntityId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn parent_of(&self, id: EntityId) -> Option<EntityId> {
        self.stored(id)?.transform()?.parent
    }

    pub(crate) fn stored(&self, id: EntityId) -> Option<&Entity> {
        let handle = self.ids.get(&id)?;
        self.slots[handle.index as usize].entity.as_ref()
    }

    pub(crate) fn live_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let handle = self.ids.get(&id)?;
        self.slots[handle.index as usize]
            .entity
            .as_mut()
            .filter(|e| !e.deleted)
    }

    // -- components --------------------------------------------------------

    pub fn component(&self, id: EntityId, net_id: NetId) -> Option<&ComponentData> {
        self.get(id)?.data(net_id)
    }

    /// Mutates a component and stamps it with the current tick.
    pub fn modify_component<R>(
        &mut self,
        id: EntityId,
        net_id: NetId,
        f: impl FnOnce(&mut ComponentData) -> R,
    ) -> Result<R, EntityError> {
        let tick = self.current_tick;
        let previous_parent = self.parent_of(id);
        let entity = self.live_mut(id).ok_or(EntityError::UnknownEntity(id))?;
        let component = entity
            .component_mut(net_id)
            .ok_or(ComponentError::UnknownNetId(net_id))?;
        let result = f(&mut component.data);
        component.mark_modified(tick);
        entity.mark_modified(tick);

        if net_id == NetId::TRANSFORM {
            self.relink_parent(id, previous_parent);
        }
        if net_id == NetId::TRANSFORM || net_id == NetId::COLLIDABLE {
            self.resync(id);
        }
        Ok(result)
    }

    /// Moves the entity relative to its parent or map. Setting the current
    /// position is not a change.
    pub fn set_position(&mut self, id: EntityId, position: Vec2) -> Result<(), EntityError> {
        let transform = self
            .get(id)
            .and_then(Entity::transform)
            .ok_or(EntityError::UnknownEntity(id))?;
        if transform.local_position() == position {
            return Ok(());
        }
        self.modify_component(id, NetId::TRANSFORM, |data| {
            if let Some(transform) = data.as_transform_mut() {
                transform.set_local_position(position);
            }
        })
    }

    pub fn set_rotation(&mut self, id: EntityId, rotation: f32) -> Result<(), EntityError> {
        let transform = self
            .get(id)
            .and_then(Entity::transform)
            .ok_or(EntityError::UnknownEntity(id))?;
        if transform.rotation == rotation {
            return Ok(());
        }
        self.modify_component(id, NetId::TRANSFORM, |data| {
            if let Some(transform) = data.as_transform_mut() {
                transform.rotation = rotation;
            }
        })
    }

    /// Attaches a default-constructed component and runs its hooks. The
    /// state is not stamped, so only the added marker replicates until it is
    /// modified.
    pub fn add_component(&mut self, id: EntityId, net_id: NetId) -> Result<(), EntityError> {
        let registry = Arc::clone(&self.registry);
        let registration = registry.lookup(net_id)?;
        let tick = self.current_tick;

        let entity = self.live_mut(id).ok_or(EntityError::UnknownEntity(id))?;
        if entity.has_component(net_id) {
            return Err(ComponentError::AlreadyAttached { entity: id, net_id }.into());
        }

        let mut component =
            Component::new(net_id, registration.net_synced, (registration.construct)(), tick);
        component.clear_ticks();
        run_hooks(registration, id, &mut component.data)?;
        entity.components.insert(net_id, component);
        entity.mark_modified(tick);

        if net_id == NetId::COLLIDABLE {
            self.resync(id);
        }
        Ok(())
    }

    /// Detaches a component. Returns false when it was not attached.
    pub fn remove_component(&mut self, id: EntityId, net_id: NetId) -> Result<bool, EntityError> {
        if ComponentRegistry::is_mandatory(net_id) {
            return Err(ComponentError::Mandatory(net_id).into());
        }

        let tick = self.current_tick;
        let entity = self.live_mut(id).ok_or(EntityError::UnknownEntity(id))?;
        let Some(component) = entity.component_mut(net_id) else {
            return Ok(false);
        };
        component.mark_deleted(tick);
        entity.mark_modified(tick);

        if net_id == NetId::COLLIDABLE {
            self.resync(id);
        }
        Ok(true)
    }

    // -- spatial -----------------------------------------------------------

    /// Position in map space, composing the parent chain.
    pub fn world_position(&self, id: EntityId) -> Option<Vec2> {
        self.world_transform(id).map(|(_, position, _)| position)
    }

    pub fn world_map(&self, id: EntityId) -> Option<MapId> {
        self.world_transform(id).map(|(map, _, _)| map)
    }

    /// Rotated collidable bounds, or a point box when the entity has none.
    pub fn world_aabb(&self, id: EntityId) -> Option<Box2> {
        let (_, position, rotation) = self.world_transform(id)?;
        let aabb = match self.stored(id)?.collidable() {
            Some(collidable) => {
                let half = collidable.half_extents();
                let (sin, cos) = rotation.sin_cos();
                let (sin, cos) = (sin.abs(), cos.abs());
                Box2::centered(
                    position,
                    Vec2::new(cos * half.x + sin * half.y, sin * half.x + cos * half.y),
                )
            }
            None => Box2::from_point(position),
        };
        Some(aabb)
    }

    pub fn entities_intersecting(&self, map: MapId, aabb: &Box2, approximate: bool) -> Vec<EntityId> {
        self.live_only(self.spatial.query_region(map, aabb, approximate))
    }

    pub fn entities_at(&self, map: MapId, point: Vec2, approximate: bool) -> Vec<EntityId> {
        self.live_only(self.spatial.query_point(map, point, approximate))
    }

    pub fn any_entities_intersecting(&self, map: MapId, aabb: &Box2) -> bool {
        self.spatial.query_any(map, aabb, |id| self.contains(id))
    }

    /// Entities overlapping the bounds of `id`, excluding `id` itself.
    pub fn entities_intersecting_entity(&self, id: EntityId, approximate: bool) -> Vec<EntityId> {
        let (Some(map), Some(aabb)) = (self.world_map(id), self.world_aabb(id)) else {
            return Vec::new();
        };
        let mut found = self.entities_intersecting(map, &aabb, approximate);
        found.retain(|other| *other != id);
        found
    }

    /// Entities whose position lies within `range` of `center`. Approximate
    /// mode returns every candidate of the enclosing box.
    pub fn entities_in_range(
        &self,
        map: MapId,
        center: Vec2,
        range: f32,
        approximate: bool,
    ) -> Vec<EntityId> {
        let region = Box2::centered(center, Vec2::splat(range));
        let mut found = self.entities_intersecting(map, &region, approximate);
        if !approximate {
            found.retain(|id| {
                self.world_aabb(*id)
                    .is_some_and(|aabb| closest_point(&aabb, center).distance(center) <= range)
            });
        }
        found
    }

    /// Live entities carrying the component, by id.
    pub fn entities_with(&self, net_id: NetId) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = self
            .iter()
            .filter(|entity| entity.has_component(net_id))
            .map(Entity::id)
            .collect();
        found.sort_unstable();
        found
    }

    /// Recomputes the index entry of `id` and of everything attached to it.
    pub(crate) fn resync(&mut self, id: EntityId) {
        if let (Some(map), Some(aabb)) = (self.world_map(id), self.world_aabb(id)) {
            self.spatial.insert_or_update(id, map, aabb);
        }
        if let Some(children) = self.children.get(&id).cloned() {
            for child in children {
                self.resync(child);
            }
        }
    }

    /// Moves `id` from the children of `previous` to those of the parent its
    /// transform names now. A link that would close a cycle is not recorded.
    pub(crate) fn relink_parent(&mut self, id: EntityId, previous: Option<EntityId>) {
        let current = self.parent_of(id);
        if let Some(old) = previous.filter(|old| Some(*old) != current) {
            if let Some(siblings) = self.children.get_mut(&old) {
                siblings.retain(|child| *child != id);
            }
        }
        let Some(parent) = current else {
            return;
        };
        if self.is_ancestor(id, parent) {
            warn!("{id} cannot be attached to its own descendant {parent}");
            return;
        }
        let siblings = self.children.entry(parent).or_default();
        if !siblings.contains(&id) {
            siblings.push(id);
        }
    }

    /// Whether `ancestor` is `id` or appears on its parent chain.
    fn is_ancestor(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut next = Some(id);
        for _ in 0..=self.ids.len() {
            match next {
                Some(current) if current == ancestor => return true,
                Some(current) => next = self.parent_of(current),
                None => return false,
            }
        }
        true
    }

    fn live_only(&self, mut ids: Vec<EntityId>) -> Vec<EntityId> {
        ids.retain(|id| self.contains(*id));
        ids
    }

    fn world_transform(&self, id: EntityId) -> Option<(MapId, Vec2, f32)> {
        let transform = self.stored(id)?.transform()?;
        let mut map = transform.map;
        let mut position = transform.local_position();
        let mut rotation = transform.rotation;
        let mut parent = transform.parent;

        // Bounded walk: mirrored data could in theory describe a cycle.
        let mut depth = 0;
        while let Some(parent_id) = parent {
            let Some(parent_transform) = self.stored(parent_id).and_then(Entity::transform) else {
                break;
            };
            position = parent_transform.local_position()
                + Vec2::from_angle(parent_transform.rotation).rotate(position);
            rotation += parent_transform.rotation;
            map = parent_transform.map;
            parent = parent_transform.parent;

            depth += 1;
            if depth > self.ids.len() {
                break;
            }
        }
        Some((map, position, rotation))
    }

    // -- internals ---------------------------------------------------------

    fn reserve_slot(&mut self) -> EntityHandle {
        if let Some(index) = self.free_slots.pop() {
            return EntityHandle {
                index,
                generation: self.slots[index as usize].generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entity: None,
        });
        EntityHandle {
            index,
            generation: 0,
        }
    }

    fn load_prototype(&mut self, id: EntityId, name: &str) -> Result<(), ComponentError> {
        let prototypes = Arc::clone(&self.prototypes);
        let registry = Arc::clone(&self.registry);
        let prototype = prototypes
            .resolve(name)
            .ok_or_else(|| ComponentError::UnknownName(name.to_string()))?;
        let tick = self.current_tick;
        let Some(entity) = self.live_mut(id) else {
            return Ok(());
        };

        if let (Some(display), Some(metadata)) = (
            prototype.name.as_ref(),
            entity
                .component_mut(NetId::METADATA)
                .and_then(|c| c.data.as_metadata_mut()),
        ) {
            metadata.name = display.clone();
        }

        for spec in &prototype.components {
            let registration = registry.by_name(&spec.component)?;
            let component = entity
                .components
                .entry(registration.net_id)
                .or_insert_with(|| {
                    Component::new(
                        registration.net_id,
                        registration.net_synced,
                        (registration.construct)(),
                        tick,
                    )
                });
            (registration.load)(&mut component.data, &spec.fields)?;
        }

        entity.clear_ticks();
        Ok(())
    }

    fn attach_coordinates(&mut self, id: EntityId, coordinates: Coordinates) {
        let (map, parent, position) = match coordinates {
            Coordinates::Map { map, position } => (map, None, position),
            Coordinates::Parent { parent, position } => (
                self.world_map(parent).unwrap_or_default(),
                Some(parent),
                position,
            ),
        };

        let tick = self.current_tick;
        let previous_parent = self.parent_of(id);
        let Some(entity) = self.live_mut(id) else {
            return;
        };
        let Some(component) = entity.component_mut(NetId::TRANSFORM) else {
            return;
        };
        let Some(transform) = component.data.as_transform_mut() else {
            return;
        };

        let placed = TransformState {
            map,
            parent,
            local_position: position.to_array(),
            rotation: transform.rotation,
        };
        if *transform != placed {
            *transform = placed;
            component.mark_modified(tick);
            entity.mark_modified(tick);
        }

        self.relink_parent(id, previous_parent);
    }

    /// Runs initialize hooks then startup hooks across all components.
    pub(crate) fn initialize_entity(&mut self, id: EntityId) -> Result<(), ComponentError> {
        let registry = Arc::clone(&self.registry);
        let Some(entity) = self.live_mut(id) else {
            return Ok(());
        };

        let phases: [fn(&Registration) -> Option<HookFn>; 2] =
            [|r| r.initialize, |r| r.startup];
        for phase in phases {
            for component in entity.components.values_mut().filter(|c| c.is_live()) {
                let hook = registry.get(component.net_id).and_then(phase);
                if let Some(hook) = hook {
                    hook(id, &mut component.data)?;
                }
            }
        }
        Ok(())
    }

    /// Removes a half-built entity without leaving any trace.
    pub(crate) fn teardown(&mut self, id: EntityId) {
        self.pending_cull.retain(|pending| *pending != id);
        self.remove_storage(id);
    }

    fn remove_storage(&mut self, id: EntityId) {
        let Some(handle) = self.ids.remove(&id) else {
            return;
        };
        let slot = &mut self.slots[handle.index as usize];
        let entity = slot.entity.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(handle.index);

        self.spatial.remove(&id);
        self.children.remove(&id);
        if let Some(parent) = entity
            .as_ref()
            .and_then(Entity::transform)
            .and_then(|t| t.parent)
        {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|child| *child != id);
            }
        }
    }
}

/// Runs both hook phases for a single component.
pub(crate) fn run_hooks(
    registration: &Registration,
    id: EntityId,
    data: &mut ComponentData,
) -> Result<(), ComponentError> {
    if let Some(initialize) = registration.initialize {
        initialize(id, data)?;
    }
    if let Some(startup) = registration.startup {
        startup(id, data)?;
    }
    Ok(())
}

fn closest_point(aabb: &Box2, point: Vec2) -> Vec2 {
    point.clamp(aabb.min, aabb.max)
}
