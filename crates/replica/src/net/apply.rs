use std::mem;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace, warn};

use super::protocol::{DeletionEntry, EntityState, GameState};
use crate::entity::{Component, ComponentRegistry, Entity, EntityError, EntityStore, run_hooks};
use crate::types::{EntityId, NetId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The entity is not known yet; the state waits in the incoming buffer.
    Buffered,
    /// Deleted entity, or a creation this side could not reproduce.
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub buffered: usize,
    pub ignored: usize,
    pub deletions: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: usize,
    pub expired: usize,
    pub dropped: usize,
    pub pending: usize,
}

/// Lifecycle of a remote entity as seen by a mirror. Ids are never reused,
/// so once a tombstone is purged the id simply reads as unknown again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Unknown,
    Pending,
    Live,
    Deleted,
}

impl EntityStore {
    /// Applies a decoded state message: entity deltas first, then deletions
    /// in tick order.
    pub fn apply_game_state(&mut self, state: GameState, now: Instant) -> ApplyReport {
        let tick = state.to_tick;
        let mut report = ApplyReport::default();

        for entity_state in state.entity_states.unwrap_or_default() {
            match self.apply_entity_state(tick, entity_state, now) {
                ApplyOutcome::Applied => report.applied += 1,
                ApplyOutcome::Buffered => report.buffered += 1,
                ApplyOutcome::Ignored => report.ignored += 1,
            }
        }

        let mut deletions = state.deleted_entities.unwrap_or_default();
        deletions.sort_by_key(|entry| entry.tick);
        for entry in deletions {
            if self.apply_deletion(entry) {
                report.deletions += 1;
            }
        }
        report
    }

    /// Applies one entity delta stamped with `tick`. Deltas for unknown
    /// entities are buffered rather than rejected.
    pub fn apply_entity_state(
        &mut self,
        tick: Tick,
        state: EntityState,
        now: Instant,
    ) -> ApplyOutcome {
        match self.try_apply(tick, state) {
            Ok(outcome) => outcome,
            Err(state) => {
                trace!("buffering state for unknown {}", state.entity_id);
                let expiry = self.config.message_expiry;
                self.incoming.push(tick, state, now, expiry);
                ApplyOutcome::Buffered
            }
        }
    }

    /// Deletes the entity without recording history and tombstones the id.
    /// Repeated or unknown deletions change nothing.
    pub fn apply_deletion(&mut self, entry: DeletionEntry) -> bool {
        let id = entry.entity_id;
        let tick = self.current_tick();
        self.tombstones.entry(id).or_insert(tick);

        if !self.contains(id) {
            return false;
        }
        self.delete_entity(id, false);
        debug!("{id} deleted by authority at tick {}", entry.tick);
        true
    }

    /// Retries buffered deltas. Expired ones are dropped with a warning,
    /// ones whose entity arrived are applied, the rest wait for the next pass.
    pub fn process_message_buffer(&mut self, now: Instant) -> DrainReport {
        let mut report = DrainReport::default();

        for message in self.incoming.take() {
            let id = message.entity_id();
            if self.tombstones.contains_key(&id) {
                report.dropped += 1;
                continue;
            }
            if message.is_expired(now) {
                warn!(
                    "dropping state for {id} from tick {}: entity never arrived within {:?}",
                    message.tick, message.expires
                );
                self.incoming.record_expired();
                report.expired += 1;
                continue;
            }
            if !self.contains(id) {
                self.incoming.requeue(message);
                continue;
            }

            let tick = message.tick;
            match self.try_apply(tick, message.state) {
                Ok(ApplyOutcome::Applied) => report.applied += 1,
                Ok(_) => report.dropped += 1,
                Err(state) => self.incoming.requeue(super::buffer::IncomingEntityMessage {
                    tick,
                    state,
                    received: message.received,
                    expires: message.expires,
                }),
            }
        }

        report.pending = self.incoming.len();
        report
    }

    pub fn mirror_state(&self, id: EntityId) -> MirrorState {
        if self.tombstones.contains_key(&id) || self.stored(id).is_some_and(Entity::is_deleted) {
            MirrorState::Deleted
        } else if self.contains(id) {
            MirrorState::Live
        } else if self.incoming.is_pending(id) {
            MirrorState::Pending
        } else {
            MirrorState::Unknown
        }
    }

    /// Hands the state back when the entity is unknown and this is not its
    /// creation.
    fn try_apply(&mut self, tick: Tick, state: EntityState) -> Result<ApplyOutcome, EntityState> {
        let id = state.entity_id;
        if self.tombstones.contains_key(&id) || self.stored(id).is_some_and(Entity::is_deleted) {
            trace!("ignoring state for deleted {id}");
            return Ok(ApplyOutcome::Ignored);
        }

        if !self.contains(id) {
            if !state.is_creation() {
                return Err(state);
            }
            if let Err(err) = self.create_mirror(&state) {
                warn!("cannot mirror {id}: {err}");
                return Ok(ApplyOutcome::Ignored);
            }
        }

        let previous_parent = self.parent_of(id);
        self.apply_components(id, tick, state);
        self.relink_parent(id, previous_parent);
        self.resync(id);
        Ok(ApplyOutcome::Applied)
    }

    /// Builds the entity from its prototype, keeping only the optional
    /// components the creation announces. Anything else was removed on the
    /// authority before this mirror joined.
    fn create_mirror(&mut self, state: &EntityState) -> Result<(), EntityError> {
        let id = state.entity_id;
        let prototype = state.prototype.as_deref();
        self.create_from_prototype(prototype, Some(id))?;

        if let Some(entity) = self.live_mut(id) {
            let announced = |net_id: NetId| {
                state
                    .changes()
                    .iter()
                    .any(|change| !change.deleted && change.net_id == net_id)
            };
            entity.components.retain(|net_id, _| {
                let keep = ComponentRegistry::is_mandatory(*net_id) || announced(*net_id);
                if !keep {
                    trace!("{id}: prototype component {net_id} was removed upstream");
                }
                keep
            });
        }

        if let Err(source) = self.initialize_entity(id) {
            self.teardown(id);
            return Err(EntityError::Creation {
                id,
                prototype: prototype.map(str::to_string),
                source,
            });
        }
        trace!("mirrored {id} ({prototype:?})");
        Ok(())
    }

    /// Added markers materialize defaults before any state is applied. Any
    /// change older than what the component already holds is skipped, so a
    /// late message never rolls state back.
    fn apply_components(&mut self, id: EntityId, tick: Tick, state: EntityState) {
        let registry = Arc::clone(&self.registry);
        let Some(entity) = self.live_mut(id) else {
            return;
        };

        for change in state.changes() {
            let net_id = change.net_id;
            if change.deleted {
                if ComponentRegistry::is_mandatory(net_id) {
                    continue;
                }
                if let Some(component) = entity.component_mut(net_id) {
                    if component.last_modified_tick <= tick {
                        component.mark_deleted(tick);
                        entity.mark_modified(tick);
                    }
                }
                continue;
            }

            // A removal from a newer message wins over a late add.
            if let Some(existing) = entity.components.get(&net_id) {
                if existing.is_live() || existing.last_modified_tick > tick {
                    continue;
                }
            }
            let Some(registration) = registry.get(net_id) else {
                warn!("{id}: added component {net_id} is not registered");
                continue;
            };
            let mut component =
                Component::new(net_id, registration.net_synced, (registration.construct)(), tick);
            component.clear_ticks();
            if let Err(err) = run_hooks(registration, id, &mut component.data) {
                warn!("{id}: hooks of added component {net_id} failed: {err}");
                continue;
            }
            entity.components.insert(net_id, component);
            entity.mark_modified(tick);
        }

        for update in state.component_states.into_iter().flatten() {
            let Some(component) = entity.component_mut(update.net_id) else {
                warn!("{id}: state for unattached component {}", update.net_id);
                continue;
            };
            if mem::discriminant(&component.data) != mem::discriminant(&update.data) {
                warn!(
                    "{id}: component {} expected {} state, got {}",
                    update.net_id,
                    component.data.kind(),
                    update.data.kind()
                );
                continue;
            }
            if component.last_modified_tick > tick {
                continue;
            }
            component.data = update.data;
            component.last_modified_tick = tick;
            entity.mark_modified(tick);
        }
    }
}
