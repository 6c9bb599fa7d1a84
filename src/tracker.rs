//! Abandoned transaction detection
//!
//! The tracker is a peer of the transaction and never points back at it. The
//! transaction keeps the tracker's status mirror current and disarms it when it
//! terminates; when the transaction is dropped the tracker fires, and counts
//! the transaction as abandoned if it was never disarmed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::statistics::TransactionManagerStatistics;
use crate::status::{AtomicStatus, TransactionStatus};
use crate::uid::Uid;

pub(crate) struct AbandonedTransactionsTracker {
    // Abandoned unless something signals otherwise
    abandoned: AtomicBool,
    statistics: Arc<dyn TransactionManagerStatistics>,
    global_transaction_id: Uid,
    status: AtomicStatus,
}

impl AbandonedTransactionsTracker {
    pub(crate) fn new(
        statistics: Arc<dyn TransactionManagerStatistics>,
        global_transaction_id: Uid,
        status: TransactionStatus,
    ) -> Self {
        Self {
            abandoned: AtomicBool::new(true),
            statistics,
            global_transaction_id,
            status: AtomicStatus::new(status),
        }
    }

    pub(crate) fn disarm(&self) {
        self.abandoned.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub(crate) fn mirror_status(&self, status: TransactionStatus) {
        self.status.store(status);
    }

    /// One-shot: a second call after firing does nothing.
    pub(crate) fn run(&self) {
        if self.abandoned.swap(false, Ordering::SeqCst) {
            self.statistics.mark_abandoned();
            log::warn!("Transaction '{}' was abandoned.", self.transaction_info());
        }
    }

    fn transaction_info(&self) -> String {
        format!("{}/{}", self.global_transaction_id, self.status.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::DefaultTransactionManagerStatistics;

    fn tracker(stats: &Arc<DefaultTransactionManagerStatistics>) -> AbandonedTransactionsTracker {
        AbandonedTransactionsTracker::new(
            stats.clone(),
            Uid::new("node", 1, 1),
            TransactionStatus::NoTransaction,
        )
    }

    #[test]
    fn test_armed_tracker_counts_once() {
        let stats = Arc::new(DefaultTransactionManagerStatistics::new());
        let t = tracker(&stats);
        t.mirror_status(TransactionStatus::Active);
        assert_eq!(t.transaction_info(), "node-1-1/ACTIVE");

        t.run();
        t.run();
        assert_eq!(stats.abandoned_count(), 1);
    }

    #[test]
    fn test_disarmed_tracker_is_silent() {
        let stats = Arc::new(DefaultTransactionManagerStatistics::new());
        let t = tracker(&stats);
        assert!(t.is_armed());
        t.disarm();
        t.run();
        assert_eq!(stats.abandoned_count(), 0);
    }
}
