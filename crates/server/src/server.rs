use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use replica::{
    ChannelTransport, EntityStore, PacketLossSimulation, PeerId, PrototypeResolver,
    PrototypeSet, ReplicationClient, ReplicationHost, StateCodec,
};

use crate::config::ServerConfig;
use crate::simulation::{Spawner, ballistics, demo_prototypes, demo_registry, spawn_scenery};

/// An in-process mirror fed by the host's channel transport.
struct Mirror {
    peer: PeerId,
    client: ReplicationClient,
}

pub struct ReplicaServer {
    host: ReplicationHost<ChannelTransport>,
    mirrors: Vec<Mirror>,
    config: ServerConfig,
    running: Arc<AtomicBool>,
    ticks: u64,
    started: Instant,
    last_tick_time: Instant,
    last_report: Instant,
}

impl ReplicaServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let registry = Arc::new(demo_registry().context("registering demo components")?);
        let prototypes: Arc<dyn PrototypeResolver + Send + Sync> = match &config.prototypes {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let set = PrototypeSet::from_json(&source)
                    .with_context(|| format!("parsing {}", path.display()))?;
                info!("loaded {} prototypes from {}", set.len(), path.display());
                Arc::new(set)
            }
            None => Arc::new(demo_prototypes()),
        };

        let new_store = || {
            EntityStore::new(
                Arc::clone(&registry),
                Arc::clone(&prototypes),
                config.replication.clone(),
            )
        };

        let loss = config.packet_loss.clone().unwrap_or_default();
        let mut host = ReplicationHost::new(
            new_store(),
            StateCodec::new(&config.replication),
            ChannelTransport::new(loss),
            config.tick_rate,
            config.mirrors.max(1),
        );

        let mut mirrors = Vec::with_capacity(config.mirrors);
        for _ in 0..config.mirrors {
            let (client, ingress) =
                ReplicationClient::new(new_store(), StateCodec::new(&config.replication));
            let peer = host.add_peer()?;
            host.transport_mut().connect(peer, ingress);
            mirrors.push(Mirror { peer, client });
        }

        let scenery = spawn_scenery(host.store_mut()).context("spawning scenery")?;
        info!("spawned {} scenery entities", scenery.len());
        host.add_system(Spawner::new(config.spawn_interval));
        host.add_system(ballistics);

        let now = Instant::now();
        Ok(Self {
            host,
            mirrors,
            config,
            running: Arc::new(AtomicBool::new(true)),
            ticks: 0,
            started: now,
            last_tick_time: now,
            last_report: now,
        })
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            std::thread::sleep(Duration::from_millis(1));
        }
        self.report();
        self.check_convergence();
        self.host.store_mut().flush();
    }

    /// Steps the host by the elapsed wall time and lets every mirror catch
    /// up. Acknowledgements travel back out of band.
    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;

        let ran = self.host.update(delta);
        if ran == 0 {
            return;
        }
        self.ticks += u64::from(ran);

        let dt = self.host.timestep().dt_secs();
        for mirror in &mut self.mirrors {
            mirror.client.process(dt, now);
            self.host
                .acknowledge(mirror.peer, mirror.client.last_applied_tick());
        }

        if now.duration_since(self.last_report) >= self.config.stats_interval {
            self.last_report = now;
            self.report();
        }

        let out_of_ticks = self.config.max_ticks.is_some_and(|max| self.ticks >= max);
        let out_of_time = self
            .config
            .duration
            .is_some_and(|limit| now.duration_since(self.started) >= limit);
        if out_of_ticks || out_of_time {
            self.running.store(false, Ordering::SeqCst);
        }
    }

    fn report(&self) {
        let stats = self.host.stats();
        info!(
            "tick {} | {} entities | {} history | sent {} msgs, {:.0} B avg, {:.1}% reliable, {} compressed, {} dropped",
            self.host.current_tick(),
            self.host.store().len(),
            self.host.store().history().len(),
            stats.messages_sent,
            stats.average_message_size(),
            stats.reliable_ratio() * 100.0,
            stats.compressed_sent,
            self.host.transport().dropped(),
        );

        for mirror in &self.mirrors {
            let stats = mirror.client.stats();
            info!(
                "  {} at tick {} | {} entities | {} received, {} late, {} buffered, {} expired, {} malformed",
                mirror.peer,
                mirror.client.last_applied_tick(),
                mirror.client.store().len(),
                stats.messages_received,
                stats.stale_received,
                stats.entity_states_buffered,
                stats.buffered_expired,
                stats.malformed_received,
            );
        }
    }

    /// Compares every mirror against the host by entity positions.
    fn check_convergence(&self) {
        let host = self.host.store();
        for mirror in &self.mirrors {
            let store = mirror.client.store();
            let diverged = host
                .live_ids()
                .into_iter()
                .filter(|id| store.world_position(*id) != host.world_position(*id))
                .count();
            if diverged == 0 && store.len() == host.len() {
                info!("{} matches the host", mirror.peer);
            } else {
                warn!(
                    "{} diverges: {diverged} entities differ, {} vs {} live",
                    mirror.peer,
                    store.len(),
                    host.len()
                );
            }
        }
    }
}

pub fn packet_loss(percent: f32) -> Option<PacketLossSimulation> {
    (percent > 0.0).then(|| PacketLossSimulation::new(percent / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_converge_without_loss() {
        let config = ServerConfig {
            mirrors: 2,
            spawn_interval: 2,
            ..Default::default()
        };
        let mut server = ReplicaServer::new(config).unwrap();

        for _ in 0..40 {
            server.last_tick_time = Instant::now() - server.host.timestep().dt();
            server.tick_once();
        }

        let host = server.host.store();
        assert!(host.len() > 8);
        for mirror in &server.mirrors {
            assert_eq!(mirror.client.store().len(), host.len());
            for id in host.live_ids() {
                assert_eq!(
                    mirror.client.store().world_position(id),
                    host.world_position(id)
                );
            }
        }
    }
}
