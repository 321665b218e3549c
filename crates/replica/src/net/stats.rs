/// Running counters for one replication endpoint.
#[derive(Debug, Clone, Default)]
pub struct ReplicationStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub compressed_sent: u64,
    pub reliable_sent: u64,
    pub send_failures: u64,
    pub malformed_received: u64,
    pub stale_received: u64,
    pub entity_states_applied: u64,
    pub entity_states_buffered: u64,
    pub buffered_expired: u64,
}

impl ReplicationStats {
    /// Share of sent messages that needed the reliable channel.
    pub fn reliable_ratio(&self) -> f32 {
        if self.messages_sent == 0 {
            return 0.0;
        }
        self.reliable_sent as f32 / self.messages_sent as f32
    }

    pub fn average_message_size(&self) -> f32 {
        if self.messages_sent == 0 {
            return 0.0;
        }
        self.bytes_sent as f32 / self.messages_sent as f32
    }
}
