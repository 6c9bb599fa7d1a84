//! Transaction outcome counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Sink for transaction outcome counts.
///
/// `suspended` tells whether the transaction was parked off-thread by the
/// manager at the moment it completed.
pub trait TransactionManagerStatistics: Send + Sync {
    fn mark_begin(&self) {}
    fn mark_committed(&self, suspended: bool);
    fn mark_rollback(&self, suspended: bool);
    fn mark_rollback_failure(&self, suspended: bool);
    fn mark_heuristic_commit(&self);
    fn mark_abandoned(&self);
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub started: u64,
    pub committed: u64,
    pub committed_while_suspended: u64,
    pub rolled_back: u64,
    pub rolled_back_while_suspended: u64,
    pub rollback_failures: u64,
    pub rollback_failures_while_suspended: u64,
    pub heuristic_commits: u64,
    pub abandoned: u64,
}

/// In-process atomic counters
#[derive(Debug, Default)]
pub struct DefaultTransactionManagerStatistics {
    started: AtomicU64,
    committed: AtomicU64,
    committed_while_suspended: AtomicU64,
    rolled_back: AtomicU64,
    rolled_back_while_suspended: AtomicU64,
    rollback_failures: AtomicU64,
    rollback_failures_while_suspended: AtomicU64,
    heuristic_commits: AtomicU64,
    abandoned: AtomicU64,
}

impl DefaultTransactionManagerStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            committed_while_suspended: self.committed_while_suspended.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            rolled_back_while_suspended: self.rolled_back_while_suspended.load(Ordering::Relaxed),
            rollback_failures: self.rollback_failures.load(Ordering::Relaxed),
            rollback_failures_while_suspended: self
                .rollback_failures_while_suspended
                .load(Ordering::Relaxed),
            heuristic_commits: self.heuristic_commits.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }

    pub fn committed_count(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    pub fn rollback_count(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    pub fn abandoned_count(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    pub fn heuristic_commit_count(&self) -> u64 {
        self.heuristic_commits.load(Ordering::Relaxed)
    }
}

impl TransactionManagerStatistics for DefaultTransactionManagerStatistics {
    fn mark_begin(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_committed(&self, suspended: bool) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        if suspended {
            self.committed_while_suspended.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn mark_rollback(&self, suspended: bool) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
        if suspended {
            self.rolled_back_while_suspended.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn mark_rollback_failure(&self, suspended: bool) {
        self.rollback_failures.fetch_add(1, Ordering::Relaxed);
        if suspended {
            self.rollback_failures_while_suspended.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn mark_heuristic_commit(&self) {
        self.heuristic_commits.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspended_commits_counted_separately() {
        let stats = DefaultTransactionManagerStatistics::new();
        stats.mark_committed(false);
        stats.mark_committed(true);
        stats.mark_rollback(true);
        stats.mark_rollback_failure(true);
        stats.mark_rollback_failure(false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.committed, 2);
        assert_eq!(snapshot.committed_while_suspended, 1);
        assert_eq!(snapshot.rolled_back, 1);
        assert_eq!(snapshot.rolled_back_while_suspended, 1);
        assert_eq!(snapshot.rollback_failures, 2);
        assert_eq!(snapshot.rollback_failures_while_suspended, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = DefaultTransactionManagerStatistics::new();
        stats.mark_begin();
        stats.mark_abandoned();
        stats.mark_heuristic_commit();
        stats.mark_rollback_failure(false);

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["started"], 1);
        assert_eq!(json["abandoned"], 1);
        assert_eq!(json["heuristic_commits"], 1);
        assert_eq!(json["rollback_failures"], 1);
    }
}
