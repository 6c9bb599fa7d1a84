//! Transaction status codes and the atomic cell that holds them

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

/// Transaction status, carrying the standard integer codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Active,
    MarkedRollback,
    Prepared,
    Committed,
    RolledBack,
    Unknown,
    NoTransaction,
    Preparing,
    Committing,
    RollingBack,
}

impl TransactionStatus {
    pub fn code(self) -> i32 {
        match self {
            TransactionStatus::Active => 0,
            TransactionStatus::MarkedRollback => 1,
            TransactionStatus::Prepared => 2,
            TransactionStatus::Committed => 3,
            TransactionStatus::RolledBack => 4,
            TransactionStatus::Unknown => 5,
            TransactionStatus::NoTransaction => 6,
            TransactionStatus::Preparing => 7,
            TransactionStatus::Committing => 8,
            TransactionStatus::RollingBack => 9,
        }
    }

    /// Decode a status code. Unrecognised codes map to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => TransactionStatus::Active,
            1 => TransactionStatus::MarkedRollback,
            2 => TransactionStatus::Prepared,
            3 => TransactionStatus::Committed,
            4 => TransactionStatus::RolledBack,
            6 => TransactionStatus::NoTransaction,
            7 => TransactionStatus::Preparing,
            8 => TransactionStatus::Committing,
            9 => TransactionStatus::RollingBack,
            _ => TransactionStatus::Unknown,
        }
    }

    /// Completion has started or is over
    pub fn is_finishing_or_finished(self) -> bool {
        matches!(
            self,
            TransactionStatus::Preparing
                | TransactionStatus::Prepared
                | TransactionStatus::Committing
                | TransactionStatus::Committed
                | TransactionStatus::RollingBack
                | TransactionStatus::RolledBack
        )
    }

    /// Completion is in progress
    pub fn is_working(self) -> bool {
        matches!(
            self,
            TransactionStatus::Preparing
                | TransactionStatus::Prepared
                | TransactionStatus::Committing
                | TransactionStatus::RollingBack
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Active => "ACTIVE",
            TransactionStatus::MarkedRollback => "MARKED_ROLLBACK",
            TransactionStatus::Prepared => "PREPARED",
            TransactionStatus::Committed => "COMMITTED",
            TransactionStatus::RolledBack => "ROLLEDBACK",
            TransactionStatus::Unknown => "UNKNOWN",
            TransactionStatus::NoTransaction => "NO_TRANSACTION",
            TransactionStatus::Preparing => "PREPARING",
            TransactionStatus::Committing => "COMMITTING",
            TransactionStatus::RollingBack => "ROLLING_BACK",
        }
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::NoTransaction
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Word-sized status cell; readers never observe a torn value
#[derive(Debug)]
pub(crate) struct AtomicStatus(AtomicI32);

impl AtomicStatus {
    pub(crate) fn new(status: TransactionStatus) -> Self {
        Self(AtomicI32::new(status.code()))
    }

    pub(crate) fn load(&self) -> TransactionStatus {
        TransactionStatus::from_code(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, status: TransactionStatus) {
        self.0.store(status.code(), Ordering::SeqCst);
    }

    /// Replace the status only while `allowed` holds for the current value.
    /// Returns the previous status on success.
    pub(crate) fn update_if(
        &self,
        next: TransactionStatus,
        allowed: impl Fn(TransactionStatus) -> bool,
    ) -> Result<TransactionStatus, TransactionStatus> {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |code| {
                if allowed(TransactionStatus::from_code(code)) {
                    Some(next.code())
                } else {
                    None
                }
            })
            .map(TransactionStatus::from_code)
            .map_err(TransactionStatus::from_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransactionStatus; 10] = [
        TransactionStatus::Active,
        TransactionStatus::MarkedRollback,
        TransactionStatus::Prepared,
        TransactionStatus::Committed,
        TransactionStatus::RolledBack,
        TransactionStatus::Unknown,
        TransactionStatus::NoTransaction,
        TransactionStatus::Preparing,
        TransactionStatus::Committing,
        TransactionStatus::RollingBack,
    ];

    #[test]
    fn test_codes_are_standard() {
        assert_eq!(TransactionStatus::Active.code(), 0);
        assert_eq!(TransactionStatus::NoTransaction.code(), 6);
        assert_eq!(TransactionStatus::RollingBack.code(), 9);
        for status in ALL {
            assert_eq!(TransactionStatus::from_code(status.code()), status);
        }
        assert_eq!(TransactionStatus::from_code(42), TransactionStatus::Unknown);
    }

    #[test]
    fn test_working_is_subset_of_finishing() {
        for status in ALL {
            if status.is_working() {
                assert!(status.is_finishing_or_finished(), "{}", status);
            }
        }
        assert!(!TransactionStatus::Active.is_finishing_or_finished());
        assert!(!TransactionStatus::MarkedRollback.is_finishing_or_finished());
        assert!(TransactionStatus::Committed.is_finishing_or_finished());
        assert!(!TransactionStatus::Committed.is_working());
    }

    #[test]
    fn test_update_if() {
        let cell = AtomicStatus::new(TransactionStatus::Active);
        let prev = cell.update_if(TransactionStatus::MarkedRollback, |s| !s.is_finishing_or_finished());
        assert_eq!(prev, Ok(TransactionStatus::Active));
        assert_eq!(cell.load(), TransactionStatus::MarkedRollback);

        cell.store(TransactionStatus::Committed);
        let refused = cell.update_if(TransactionStatus::MarkedRollback, |s| !s.is_finishing_or_finished());
        assert_eq!(refused, Err(TransactionStatus::Committed));
        assert_eq!(cell.load(), TransactionStatus::Committed);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(TransactionStatus::RolledBack.to_string(), "ROLLEDBACK");
        assert_eq!(TransactionStatus::MarkedRollback.to_string(), "MARKED_ROLLBACK");
    }
}
