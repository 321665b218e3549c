mod client;
mod host;
mod tick;

pub use client::{MessageOutcome, ReplicationClient};
pub use host::ReplicationHost;
pub use tick::FixedTimestep;
