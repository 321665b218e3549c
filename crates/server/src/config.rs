use std::path::PathBuf;
use std::time::Duration;

use replica::{PacketLossSimulation, ReplicationConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub mirrors: usize,
    pub packet_loss: Option<PacketLossSimulation>,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Stop after this much wall time.
    pub duration: Option<Duration>,
    /// Ticks between projectile spawns; zero disables the spawner.
    pub spawn_interval: u32,
    pub stats_interval: Duration,
    /// JSON prototype file replacing the built-in demo prototypes.
    pub prototypes: Option<PathBuf>,
    pub replication: ReplicationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            mirrors: 2,
            packet_loss: None,
            max_ticks: None,
            duration: None,
            spawn_interval: 15,
            stats_interval: Duration::from_secs(1),
            prototypes: None,
            replication: ReplicationConfig::default(),
        }
    }
}
