//! Per-tick delta computation and deletion bookkeeping.

mod diff;
mod history;

pub use diff::diff;
pub use history::DeletionHistory;
