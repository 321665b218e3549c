use std::collections::VecDeque;

use crate::net::DeletionEntry;
use crate::types::{EntityId, Tick};

/// Tick-ordered log of entity deletions kept until every peer has
/// acknowledged past them.
#[derive(Debug, Clone, Default)]
pub struct DeletionHistory {
    entries: VecDeque<DeletionEntry>,
}

impl DeletionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks must be recorded in non-decreasing order.
    pub fn record(&mut self, tick: Tick, entity_id: EntityId) {
        debug_assert!(self.entries.back().is_none_or(|last| last.tick <= tick));
        self.entries.push_back(DeletionEntry { tick, entity_id });
    }

    /// Entries with `tick >= from`.
    pub fn since(&self, from: Tick) -> Vec<DeletionEntry> {
        let start = self.entries.partition_point(|entry| entry.tick < from);
        self.entries.range(start..).copied().collect()
    }

    /// Drops entries with `tick <= up_to`. Returns how many were removed.
    pub fn cull(&mut self, up_to: Tick) -> usize {
        let count = self.entries.partition_point(|entry| entry.tick <= up_to);
        self.entries.drain(..count);
        count
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.entries.iter().any(|entry| entry.entity_id == entity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> DeletionHistory {
        let mut history = DeletionHistory::new();
        history.record(Tick(3), EntityId(1));
        history.record(Tick(5), EntityId(2));
        history.record(Tick(5), EntityId(3));
        history.record(Tick(8), EntityId(4));
        history
    }

    #[test]
    fn since_is_inclusive() {
        let history = history();
        let ids: Vec<_> = history.since(Tick(5)).iter().map(|e| e.entity_id).collect();
        assert_eq!(ids, [EntityId(2), EntityId(3), EntityId(4)]);
        assert!(history.since(Tick(9)).is_empty());
        assert_eq!(history.since(Tick::ZERO).len(), 4);
    }

    #[test]
    fn cull_is_inclusive() {
        let mut history = history();
        assert_eq!(history.cull(Tick(5)), 3);
        assert_eq!(history.len(), 1);
        assert!(history.contains(EntityId(4)));
        assert!(!history.contains(EntityId(2)));
        assert_eq!(history.cull(Tick(5)), 0);
    }
}
