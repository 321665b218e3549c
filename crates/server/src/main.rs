mod config;
mod server;
mod simulation;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use config::ServerConfig;
use replica::ReplicationConfig;
use server::{ReplicaServer, packet_loss};

#[derive(Parser)]
#[command(name = "replica-server")]
#[command(about = "Authoritative replication host driving in-process mirrors")]
struct Args {
    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 2, help = "Number of mirror peers")]
    mirrors: usize,

    #[arg(long, default_value_t = 0.0, help = "Best-effort packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, help = "Stop after this many ticks")]
    ticks: Option<u64>,

    #[arg(long, help = "Stop after this many seconds")]
    duration_secs: Option<u64>,

    #[arg(long, default_value_t = 15, help = "Ticks between projectile spawns, 0 to disable")]
    spawn_interval: u32,

    #[arg(long, default_value_t = 1000, help = "Statistics log interval in ms")]
    stats_interval_ms: u64,

    #[arg(long, help = "JSON prototype file")]
    prototypes: Option<PathBuf>,

    #[arg(long, default_value_t = 5000, help = "Buffered message expiry in ms")]
    message_expiry_ms: u64,

    #[arg(long, help = "zstd level for state messages")]
    compression_level: Option<i32>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut replication = ReplicationConfig {
        message_expiry: Duration::from_millis(args.message_expiry_ms),
        ..Default::default()
    };
    if let Some(level) = args.compression_level {
        replication.compression_level = level;
    }

    let config = ServerConfig {
        tick_rate: args.tick_rate,
        mirrors: args.mirrors,
        packet_loss: packet_loss(args.loss_percent),
        max_ticks: args.ticks,
        duration: args.duration_secs.map(Duration::from_secs),
        spawn_interval: args.spawn_interval,
        stats_interval: Duration::from_millis(args.stats_interval_ms),
        prototypes: args.prototypes,
        replication,
    };

    let mut server = ReplicaServer::new(config)?;
    log::info!(
        "replicating at {} Hz to {} mirrors",
        args.tick_rate,
        args.mirrors
    );
    server.run();
    log::info!("Server shutting down");

    Ok(())
}
