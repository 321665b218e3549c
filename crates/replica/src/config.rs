use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::spatial::GrowthPolicy;

pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 32;
pub const DEFAULT_RELIABLE_THRESHOLD: usize = 1300;
pub const DEFAULT_MESSAGE_EXPIRY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_PAYLOAD: usize = 4 * 1024 * 1024;

/// Tunables shared by the store, the codec and the incoming buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Payloads at or below this size are never compressed.
    pub compression_threshold: usize,
    /// Messages strictly larger than this go over the reliable channel.
    pub reliable_threshold: usize,
    pub compression_level: i32,
    /// Upper bound on a decompressed payload.
    pub max_payload: usize,
    /// How long a buffered message may wait for its entity to appear.
    pub message_expiry: Duration,
    pub tree_margin: f32,
    pub tree_capacity: usize,
    pub tree_first_growth: usize,
    pub tree_growth_increment: usize,
    /// Ticks a mirror keeps the id of a deleted entity to reject late diffs.
    pub tombstone_retention: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            reliable_threshold: DEFAULT_RELIABLE_THRESHOLD,
            compression_level: *zstd::compression_level_range().end(),
            max_payload: DEFAULT_MAX_PAYLOAD,
            message_expiry: DEFAULT_MESSAGE_EXPIRY,
            tree_margin: 0.1,
            tree_capacity: 16,
            tree_first_growth: 3840,
            tree_growth_increment: 256,
            tombstone_retention: 600,
        }
    }
}

impl ReplicationConfig {
    pub fn growth_policy(&self) -> GrowthPolicy {
        GrowthPolicy {
            initial: self.tree_capacity,
            first_step: self.tree_first_growth,
            increment: self.tree_growth_increment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_constants() {
        let config = ReplicationConfig::default();
        assert_eq!(config.compression_threshold, 32);
        assert_eq!(config.reliable_threshold, 1300);
        assert_eq!(config.message_expiry, Duration::from_secs(5));
        assert_eq!(config.growth_policy(), GrowthPolicy::default());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: ReplicationConfig =
            serde_json::from_str(r#"{ "reliable_threshold": 900 }"#).unwrap();
        assert_eq!(config.reliable_threshold, 900);
        assert_eq!(config.compression_threshold, 32);
    }
}
