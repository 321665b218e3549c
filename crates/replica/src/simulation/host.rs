use std::time::Duration;

use log::{debug, error, warn};

use super::tick::FixedTimestep;
use crate::entity::{EntityStore, EntitySystem};
use crate::net::{
    GameState, PeerError, PeerId, PeerRegistry, ReplicationStats, StateCodec, Transport,
};
use crate::types::Tick;

/// Authoritative side of replication: steps the store at a fixed rate and
/// sends every peer the delta since the tick it last acknowledged.
pub struct ReplicationHost<T: Transport> {
    store: EntityStore,
    codec: StateCodec,
    transport: T,
    peers: PeerRegistry,
    systems: Vec<Box<dyn EntitySystem>>,
    timestep: FixedTimestep,
    stats: ReplicationStats,
}

impl<T: Transport> ReplicationHost<T> {
    pub fn new(
        store: EntityStore,
        codec: StateCodec,
        transport: T,
        tick_rate: u32,
        max_peers: usize,
    ) -> Self {
        Self {
            store,
            codec,
            transport,
            peers: PeerRegistry::new(max_peers),
            systems: Vec::new(),
            timestep: FixedTimestep::new(tick_rate),
            stats: ReplicationStats::default(),
        }
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

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn stats(&self) -> &ReplicationStats {
        &self.stats
    }

    pub fn timestep(&self) -> &FixedTimestep {
        &self.timestep
    }

    pub fn current_tick(&self) -> Tick {
        self.store.current_tick()
    }

    pub fn add_peer(&mut self) -> Result<PeerId, PeerError> {
        let id = self.peers.add()?;
        debug!("{id} joined at tick {}", self.current_tick());
        Ok(id)
    }

    pub fn remove_peer(&mut self, id: PeerId) -> bool {
        self.peers.remove(id).is_some()
    }

    pub fn acknowledge(&mut self, peer: PeerId, tick: Tick) -> bool {
        self.peers.acknowledge(peer, tick)
    }

    /// Feeds a frame time into the clock and runs the ticks it covers.
    pub fn update(&mut self, delta: Duration) -> u32 {
        self.timestep.accumulate(delta);

        let mut ticks_run = 0;
        while self.timestep.consume_tick() {
            self.tick_once();
            ticks_run += 1;
        }
        ticks_run
    }

    /// Runs systems, replicates the result, then opens the next tick.
    /// Changes made between ticks are stamped with the tick still to be
    /// sent.
    pub fn tick_once(&mut self) -> Tick {
        let tick = self.store.current_tick();
        let dt = self.timestep.dt_secs();
        self.store.update(dt, &mut self.systems);
        self.send_states(tick);

        let horizon = self.peers.min_acked_tick().unwrap_or(tick);
        let culled = self.store.cull_deletion_history(horizon);
        if culled > 0 {
            debug!("culled {culled} deletion entries up to {horizon}");
        }
        self.store.advance_tick();
        tick
    }

    fn send_states(&mut self, tick: Tick) {
        for peer_id in self.peers.ids() {
            let Some(from) = self.peers.get(peer_id).map(|peer| peer.send_from()) else {
                continue;
            };
            let state = GameState::new(
                from,
                tick,
                self.store.entity_states(from),
                self.store.deleted_entities(from),
            );

            let message = match self.codec.encode(&state) {
                Ok(message) => message,
                Err(err) => {
                    error!("failed to encode state for {peer_id} at {tick}: {err}");
                    self.stats.send_failures += 1;
                    continue;
                }
            };

            let size = message.bytes.len() as u64;
            let channel = message.channel;
            if let Err(err) = self.transport.send(peer_id, channel, message.bytes) {
                warn!("send to {peer_id} failed: {err}");
                self.stats.send_failures += 1;
                continue;
            }

            self.stats.messages_sent += 1;
            self.stats.bytes_sent += size;
            if message.compressed {
                self.stats.compressed_sent += 1;
            }
            if channel.is_reliable() {
                self.stats.reliable_sent += 1;
            }
            if let Some(peer) = self.peers.get_mut(peer_id) {
                peer.messages_sent += 1;
                peer.bytes_sent += size;
                if channel.is_reliable() {
                    peer.reliable_sent += 1;
                }
            }
        }
    }
}
