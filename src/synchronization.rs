//! Completion listeners

use std::sync::Arc;

use crate::error::BoxError;
use crate::status::TransactionStatus;

/// Callback pair notified around transaction completion.
///
/// A failing `before_completion` rolls the transaction back. Failures from
/// `after_completion` are logged and ignored.
pub trait Synchronization: Send + Sync {
    fn before_completion(&self) -> Result<(), BoxError>;

    fn after_completion(&self, status: TransactionStatus) -> Result<(), BoxError>;
}

pub type SynchronizationHandle = Arc<dyn Synchronization>;
