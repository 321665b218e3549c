use std::time::Instant;

use log::{trace, warn};

use crate::entity::{EntityStore, EntitySystem};
use crate::net::{
    DrainReport, Ingress, IngressQueue, MirrorState, ReplicationStats, StateCodec, ingress_channel,
};
use crate::types::{EntityId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Applied(Tick),
    /// Older than the newest applied message. Still applied, but component
    /// states newer than it are kept and the clock does not move back.
    Late(Tick),
    Malformed,
}

/// Mirror side of replication. Network code pushes raw messages through the
/// [`Ingress`] handle; everything is decoded and applied on the thread that
/// calls [`process`](Self::process).
pub struct ReplicationClient {
    store: EntityStore,
    codec: StateCodec,
    ingress: IngressQueue,
    systems: Vec<Box<dyn EntitySystem>>,
    last_applied: Tick,
    stats: ReplicationStats,
}

impl ReplicationClient {
    pub fn new(store: EntityStore, codec: StateCodec) -> (Self, Ingress) {
        let (sender, ingress) = ingress_channel();
        let client = Self {
            store,
            codec,
            ingress,
            systems: Vec::new(),
            last_applied: Tick::ZERO,
            stats: ReplicationStats::default(),
        };
        (client, sender)
    }

    pub fn add_system(&mut self, system: impl EntitySystem + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn stats(&self) -> &ReplicationStats {
        &self.stats
    }

    /// Newest authoritative tick applied; this is what gets acknowledged.
    pub fn last_applied_tick(&self) -> Tick {
        self.last_applied
    }

    pub fn mirror_state(&self, id: EntityId) -> MirrorState {
        self.store.mirror_state(id)
    }

    /// Drains the ingestion queue and applies every message in it. Buffered
    /// deltas expire relative to when the network thread received them.
    pub fn receive(&mut self) -> usize {
        let datagrams: Vec<_> = self.ingress.try_iter().collect();
        let count = datagrams.len();
        for datagram in datagrams {
            trace!(
                "{} bytes on {:?}",
                datagram.bytes.len(),
                datagram.channel
            );
            self.handle_message(&datagram.bytes, datagram.received);
        }
        count
    }

    pub fn handle_message(&mut self, bytes: &[u8], now: Instant) -> MessageOutcome {
        self.stats.messages_received += 1;
        self.stats.bytes_received += bytes.len() as u64;

        let state = match self.codec.decode(bytes) {
            Ok(state) => state,
            Err(err) => {
                warn!("dropping malformed state message of {} bytes: {err}", bytes.len());
                self.stats.malformed_received += 1;
                return MessageOutcome::Malformed;
            }
        };

        let tick = state.to_tick;
        let late = tick <= self.last_applied;
        if late {
            trace!("late state for {tick}, already at {}", self.last_applied);
            self.stats.stale_received += 1;
        } else {
            self.store.set_tick(tick);
            self.last_applied = tick;
        }

        let report = self.store.apply_game_state(state, now);
        self.stats.entity_states_applied += report.applied as u64;
        self.stats.entity_states_buffered += report.buffered as u64;
        if late {
            MessageOutcome::Late(tick)
        } else {
            MessageOutcome::Applied(tick)
        }
    }

    /// Receives pending messages, then runs one store update: buffered
    /// retries, local systems and the cull pass.
    pub fn process(&mut self, frame_time: f32, now: Instant) -> DrainReport {
        self.receive();
        let drained = self.store.update_at(now, frame_time, &mut self.systems);
        self.stats.entity_states_applied += drained.applied as u64;
        self.stats.buffered_expired += drained.expired as u64;
        drained
    }
}
