use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::protocol::EntityState;
use crate::types::{EntityId, Tick};

/// An entity delta that named an entity this side does not know yet.
#[derive(Debug, Clone)]
pub struct IncomingEntityMessage {
    pub tick: Tick,
    pub state: EntityState,
    pub received: Instant,
    pub expires: Duration,
}

impl IncomingEntityMessage {
    pub fn entity_id(&self) -> EntityId {
        self.state.entity_id
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.received) > self.expires
    }
}

/// FIFO of buffered deltas, retried every drain pass until the entity shows
/// up or the message expires.
#[derive(Debug, Default)]
pub struct IncomingBuffer {
    pending: VecDeque<IncomingEntityMessage>,
    buffered_total: u64,
    expired_total: u64,
}

impl IncomingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tick: Tick, state: EntityState, received: Instant, expires: Duration) {
        self.buffered_total += 1;
        self.pending.push_back(IncomingEntityMessage {
            tick,
            state,
            received,
            expires,
        });
    }

    /// Takes every pending message for one drain pass.
    pub fn take(&mut self) -> VecDeque<IncomingEntityMessage> {
        std::mem::take(&mut self.pending)
    }

    /// Puts a message back without counting it as newly buffered.
    pub fn requeue(&mut self, message: IncomingEntityMessage) {
        self.pending.push_back(message);
    }

    pub fn record_expired(&mut self) {
        self.expired_total += 1;
    }

    pub fn is_pending(&self, entity_id: EntityId) -> bool {
        self.pending.iter().any(|m| m.entity_id() == entity_id)
    }

    pub fn buffered_total(&self) -> u64 {
        self.buffered_total
    }

    pub fn expired_total(&self) -> u64 {
        self.expired_total
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: u32) -> EntityState {
        EntityState::new(EntityId(id), None, Vec::new(), Vec::new())
    }

    #[test]
    fn expiry_is_measured_from_first_receipt() {
        let start = Instant::now();
        let mut buffer = IncomingBuffer::new();
        buffer.push(Tick(4), message(9), start, Duration::from_secs(5));

        let pending = buffer.take();
        assert!(buffer.is_empty());
        let first = &pending[0];
        assert!(!first.is_expired(start + Duration::from_secs(5)));
        assert!(first.is_expired(start + Duration::from_secs(6)));
        // A clock reading earlier than receipt never counts as expired.
        assert!(!first.is_expired(start));
    }

    #[test]
    fn requeue_keeps_counters_stable() {
        let now = Instant::now();
        let mut buffer = IncomingBuffer::new();
        buffer.push(Tick(1), message(1), now, Duration::from_secs(1));
        buffer.push(Tick(1), message(2), now, Duration::from_secs(1));

        for message in buffer.take() {
            buffer.requeue(message);
        }
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.buffered_total(), 2);
        assert!(buffer.is_pending(EntityId(2)));
        assert!(!buffer.is_pending(EntityId(3)));
    }
}
