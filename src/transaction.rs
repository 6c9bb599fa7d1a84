//! The transaction object
//!
//! A `Transaction` coordinates one unit of work against its enlisted
//! resources. It offers the full distributed-transaction contract but commits
//! with one-phase commit only.
//!
//! ```text
//!  NO_TRANSACTION ──begin──▶ ACTIVE ──setRollbackOnly──▶ MARKED_ROLLBACK
//!                              │                              │
//!                           commit                      commit / rollback
//!                              ▼                              ▼
//!                         COMMITTING ──failure──▶ ROLLING_BACK ──▶ ROLLEDBACK
//!                              │
//!                              ▼
//!                          COMMITTED
//! ```
//!
//! ### Commit
//! 1. Before-completion: ordinary synchronizations, then interposed ones
//! 2. Rollback-only, timeout and validation-window checks
//! 3. One-phase commit of each resource in ascending order
//! 4. After-completion: interposed synchronizations, then ordinary ones
//!
//! Any failure before step 4 rolls the transaction back. After-completion
//! always runs once the commit has passed its liveness checks, and the
//! resource list and scratch map are always cleared.
//!
//! Resources and synchronizations are caller code. A panic inside one of them
//! is caught and treated as that callback failing.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::cow::CowList;
use crate::error::{BoxError, ErrorReporter, GafferError, Result};
use crate::manager::TransactionContext;
use crate::resource::{
    same_resource, sorted_resources, ResourceHandle, ResourceKind, XaError, XaResource, XAER_RMFAIL,
};
use crate::resource_map::{ResourceMap, ResourceValue};
use crate::statistics::TransactionManagerStatistics;
use crate::status::{AtomicStatus, TransactionStatus};
use crate::synchronization::{Synchronization, SynchronizationHandle};
use crate::tracker::AbandonedTransactionsTracker;
use crate::uid::Uid;

pub struct Transaction {
    status: AtomicStatus,
    global_transaction_id: Uid,
    xa_resources: CowList<ResourceHandle>,
    synchronizations: CowList<SynchronizationHandle>,
    interposed_synchronizations: CowList<SynchronizationHandle>,
    resources: ResourceMap,
    start_time_millis: i64,
    before_commit_validation_required_time_ms: AtomicI64,
    timeout_millis: AtomicI64,
    suspended: AtomicBool,
    errors: ErrorReporter,
    clock: Arc<dyn Clock>,
    statistics: Arc<dyn TransactionManagerStatistics>,
    tracker: AbandonedTransactionsTracker,
}

impl Transaction {
    /// Create a transaction in `NO_TRANSACTION` status. The abandonment
    /// tracker is armed from this point on.
    pub fn new(context: &TransactionContext) -> Self {
        let clock = Arc::clone(context.clock());
        let statistics = Arc::clone(context.statistics());
        let start_time_millis = clock.current_time_millis();
        let global_transaction_id = context.uid_generator().generate(start_time_millis);
        let status = TransactionStatus::NoTransaction;
        let tracker = AbandonedTransactionsTracker::new(
            Arc::clone(&statistics),
            global_transaction_id.clone(),
            status,
        );

        Self {
            status: AtomicStatus::new(status),
            global_transaction_id,
            xa_resources: CowList::new(),
            synchronizations: CowList::new(),
            interposed_synchronizations: CowList::new(),
            resources: ResourceMap::new(),
            start_time_millis,
            before_commit_validation_required_time_ms: AtomicI64::new(-1),
            timeout_millis: AtomicI64::new(-1),
            suspended: AtomicBool::new(false),
            errors: ErrorReporter::new(context.config().log_exceptions),
            clock,
            statistics,
            tracker,
        }
    }

    /// Start the transaction.
    ///
    /// `timeout_seconds = None` means no timeout. A negative validation window
    /// disables before-commit validation.
    pub fn begin(&self, timeout_seconds: Option<u32>, before_commit_validation_required_time_ms: i64) -> Result<()> {
        log::debug!(
            "Starting transaction '{}' with timeout of '{}' seconds.",
            self.transaction_info(),
            timeout_seconds.map_or_else(|| "infinite".to_string(), |t| t.to_string())
        );
        if self.status() != TransactionStatus::NoTransaction {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Can not begin '{}'. Transaction has already been started.",
                self.transaction_info()
            ))));
        }
        if let Some(seconds) = timeout_seconds {
            self.set_timeout_millis(i64::from(seconds) * 1000);
        }
        self.before_commit_validation_required_time_ms
            .store(before_commit_validation_required_time_ms, Ordering::SeqCst);
        self.set_status(TransactionStatus::Active);
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        log::debug!("Committing transaction '{}'.", self.transaction_info());
        let status = self.status();
        if status == TransactionStatus::NoTransaction {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Can not commit '{}'. Transaction has not been started.",
                self.transaction_info()
            ))));
        }
        if status.is_finishing_or_finished() {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Can not commit '{}' with status '{}'. Transaction is finishing or finished.",
                self.transaction_info(),
                status
            ))));
        }

        let outcome = self.complete();

        self.fire_after_completion_event();
        let cleanup = self.clear_all();
        outcome.and(cleanup)
    }

    fn complete(&self) -> Result<()> {
        let before = catch_panic(|| self.fire_before_completion_event())
            .unwrap_or_else(|panic| Err(BoxError::from(panic)));
        if let Err(cause) = before {
            self.rollback()?;
            return Err(self.errors.raise(GafferError::rollback_caused_by(
                format!(
                    "Can not commit '{}'. Before completion event firing failed.",
                    self.transaction_info()
                ),
                cause,
            )));
        }

        if self.status() == TransactionStatus::MarkedRollback {
            self.rollback()?;
            return Err(self.errors.raise(GafferError::rollback(format!(
                "Can not commit '{}'. Transaction was marked as to be rolled back.",
                self.transaction_info()
            ))));
        }
        if self.is_timed_out() {
            self.rollback()?;
            return Err(self.errors.raise(GafferError::rollback(format!(
                "Can not commit '{}'. Transaction has timed out.",
                self.transaction_info()
            ))));
        }

        if self.before_commit_validation_required() {
            self.validate_resources()?;
        }

        let resources = sorted_resources(&self.xa_resources.snapshot()?);
        self.set_status(TransactionStatus::Committing);

        let mut failure = None;
        for (idx, resource) in resources.iter().enumerate() {
            let committed = catch_panic(|| resource.commit(Some(&self.global_transaction_id), true))
                .unwrap_or_else(|panic| Err(resource_panic(panic)));
            if let Err(e) = committed {
                failure = Some((idx, e));
                break;
            }
        }

        if let Some((committed, cause)) = failure {
            let message = format!(
                "Can not commit '{}'. Committing a resource failed.",
                self.transaction_info()
            );
            if committed == 0 {
                self.rollback()?;
                return Err(self
                    .errors
                    .raise(GafferError::rollback_caused_by(message, Box::new(cause))));
            }

            self.statistics.mark_heuristic_commit();
            // Committed resources are past the point of rollback
            for done in &resources[..committed] {
                self.xa_resources.remove_first(|r| same_resource(r, done))?;
            }
            self.rollback()?;
            return Err(self
                .errors
                .raise(GafferError::heuristic_mixed(message, Box::new(cause))));
        }

        self.set_status(TransactionStatus::Committed);
        self.tracker.disarm();
        self.statistics.mark_committed(self.is_suspended());
        log::debug!("Transaction '{}' successfully committed.", self.transaction_info());
        Ok(())
    }

    fn validate_resources(&self) -> Result<()> {
        for resource in sorted_resources(&self.xa_resources.snapshot()?) {
            let validatable = match resource.as_validatable() {
                Some(v) => v,
                None => continue,
            };
            let failure = match validatable.is_valid() {
                Ok(true) => None,
                Ok(false) => Some(BoxError::from(format!(
                    "Resource {:?} is not valid anymore.",
                    resource
                ))),
                Err(e) => Some(e),
            };
            if let Some(cause) = failure {
                self.rollback()?;
                return Err(self.errors.raise(GafferError::rollback_caused_by(
                    format!(
                        "Can not commit '{}'. Invalid xaResource found: {:?}",
                        self.transaction_info(),
                        resource
                    ),
                    cause,
                )));
            }
        }
        Ok(())
    }

    /// Roll back every enlisted resource.
    ///
    /// Resource errors are logged and skipped. A resource that panics, or a
    /// failure of the rollback machinery itself, still leaves the transaction
    /// rolled back and cleared but counts as a rollback failure and is
    /// returned as a runtime error.
    pub fn rollback(&self) -> Result<()> {
        match self.rollback_resources() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.statistics.mark_rollback_failure(self.is_suspended());
                Err(self.errors.raise(GafferError::wrap_runtime(e)))
            }
        }
    }

    fn rollback_resources(&self) -> Result<()> {
        self.tracker.disarm();
        log::debug!("Rolling back transaction '{}'.", self.transaction_info());
        self.set_status(TransactionStatus::RollingBack);

        let mut panicked = None;
        for resource in sorted_resources(&self.xa_resources.snapshot()?) {
            match catch_panic(|| resource.rollback(Some(&self.global_transaction_id))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Rollback failed for resource {:?}: {}", resource, e),
                Err(panic) => {
                    log::error!("Rollback panicked for resource {:?}: {}", resource, panic);
                    if panicked.is_none() {
                        panicked = Some(resource_panic(panic));
                    }
                }
            }
        }
        self.clear_all()?;
        self.set_status(TransactionStatus::RolledBack);

        if let Some(cause) = panicked {
            return Err(GafferError::runtime_caused_by(
                format!(
                    "Rollback of transaction '{}' failed.",
                    self.transaction_info()
                ),
                Box::new(cause),
            ));
        }
        self.statistics.mark_rollback(self.is_suspended());
        Ok(())
    }

    /// Mark the transaction so the only possible outcome is rollback.
    ///
    /// Ignored once completion has started.
    pub fn set_rollback_only(&self) {
        log::debug!("Marking transaction '{}' to roll back.", self.transaction_info());
        match self
            .status
            .update_if(TransactionStatus::MarkedRollback, |s| !s.is_finishing_or_finished())
        {
            Ok(_) => self.tracker.mirror_status(TransactionStatus::MarkedRollback),
            Err(current) => log::debug!(
                "Ignoring rollback-only mark for transaction '{}' with status '{}'.",
                self.global_transaction_id,
                current
            ),
        }
    }

    pub fn enlist_resource(&self, resource: ResourceHandle) -> Result<bool> {
        log::debug!(
            "Enlisting resource '{:?}' for transaction '{}'.",
            resource,
            self.transaction_info()
        );
        let status = self.status();
        if status == TransactionStatus::NoTransaction {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Can not enlist resource. Transaction '{}' has not been started.",
                self.transaction_info()
            ))));
        }
        if status == TransactionStatus::MarkedRollback {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Can not enlist resource. Transaction '{}' has been marked to roll back.",
                self.transaction_info()
            ))));
        }
        if status.is_finishing_or_finished() {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Can not enlist resource. Transaction '{}' is finished or finishing.",
                self.transaction_info()
            ))));
        }
        if resource.kind() != ResourceKind::Local {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Full XA is not supported yet for transaction '{}', only local one-phase resources can participate.",
                self.transaction_info()
            ))));
        }
        self.xa_resources.push(resource)?;
        Ok(true)
    }

    /// Remove a previously enlisted resource. `flag` is one of the `TM*`
    /// constants and is only used for logging.
    pub fn delist_resource(&self, resource: &ResourceHandle, flag: i32) -> Result<bool> {
        log::debug!(
            "Delisting resource '{:?}' (flag {:#x}) for transaction '{}'.",
            resource,
            flag,
            self.transaction_info()
        );
        let status = self.status();
        if status == TransactionStatus::NoTransaction {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Can not delist resource. Transaction '{}' has not been started.",
                self.transaction_info()
            ))));
        }
        if status.is_working() {
            return Err(self.errors.raise(GafferError::illegal_state(format!(
                "Can not delist resource. Transaction '{}' commit is in progress.",
                self.transaction_info()
            ))));
        }
        self.xa_resources.remove_first(|r| same_resource(r, resource))
    }

    pub fn register_synchronization(&self, sync: SynchronizationHandle) -> Result<()> {
        log::debug!(
            "Registering synchronization for transaction '{}'.",
            self.transaction_info()
        );
        if self.status() == TransactionStatus::MarkedRollback {
            return Err(self
                .errors
                .raise(GafferError::rollback("Transaction is marked as rollback-only.")));
        }
        self.synchronizations.push(sync)
    }

    /// Interposed synchronizations run after ordinary ones before completion
    /// and before them after completion.
    pub fn register_interposed_synchronization(&self, sync: SynchronizationHandle) -> Result<()> {
        log::debug!(
            "Registering interposed synchronization for transaction '{}'.",
            self.transaction_info()
        );
        self.interposed_synchronizations.push(sync)
    }

    fn fire_before_completion_event(&self) -> std::result::Result<(), BoxError> {
        for sync in self.synchronizations.snapshot()?.iter() {
            sync.before_completion()?;
        }
        for sync in self.interposed_synchronizations.snapshot()?.iter() {
            sync.before_completion()?;
        }
        Ok(())
    }

    fn fire_after_completion_event(&self) {
        let lists = [&self.interposed_synchronizations, &self.synchronizations];
        for list in lists {
            let syncs = match list.snapshot() {
                Ok(syncs) => syncs,
                Err(e) => {
                    log::error!("{}", e);
                    continue;
                }
            };
            for sync in syncs.iter() {
                let result = catch_panic(|| sync.after_completion(self.status()))
                    .unwrap_or_else(|panic| Err(BoxError::from(panic)));
                if let Err(e) = result {
                    log::error!(
                        "After completion callback failed for transaction '{}': {}",
                        self.global_transaction_id,
                        e
                    );
                }
            }
        }
    }

    fn clear_all(&self) -> Result<()> {
        self.xa_resources.clear()?;
        self.resources.clear()
    }

    pub fn put_resource<T: Any + Send + Sync>(&self, key: &str, value: T) -> Result<()> {
        self.put_resource_value(key, Arc::new(value))
    }

    pub fn put_resource_value(&self, key: &str, value: ResourceValue) -> Result<()> {
        if key.is_empty() {
            return Err(self
                .errors
                .raise(GafferError::illegal_argument("Resource key can not be empty.")));
        }
        self.resources.put(key, value)
    }

    /// Typed lookup; a value stored under `key` with a different type reads as `None`.
    pub fn get_resource<T: Any + Send + Sync>(&self, key: &str) -> Result<Option<Arc<T>>> {
        Ok(self
            .get_resource_value(key)?
            .and_then(|value| value.downcast::<T>().ok()))
    }

    pub fn get_resource_value(&self, key: &str) -> Result<Option<ResourceValue>> {
        if key.is_empty() {
            return Err(self
                .errors
                .raise(GafferError::illegal_argument("Resource key can not be empty.")));
        }
        self.resources.get(key)
    }

    fn set_status(&self, status: TransactionStatus) {
        log::debug!(
            "Setting transaction '{}' status to '{}'.",
            self.transaction_info(),
            status
        );
        self.status.store(status);
        self.tracker.mirror_status(status);
    }

    pub fn status(&self) -> TransactionStatus {
        self.status.load()
    }

    /// Status as its standard integer code
    pub fn status_code(&self) -> i32 {
        self.status().code()
    }

    pub fn global_transaction_id(&self) -> &Uid {
        &self.global_transaction_id
    }

    pub fn start_time_millis(&self) -> i64 {
        self.start_time_millis
    }

    pub fn timeout_millis(&self) -> i64 {
        self.timeout_millis.load(Ordering::SeqCst)
    }

    pub fn set_timeout_millis(&self, timeout_millis: i64) {
        self.timeout_millis.store(timeout_millis, Ordering::SeqCst);
    }

    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// A timeout of zero or less means no timeout.
    pub fn is_timed_out(&self) -> bool {
        let timeout_millis = self.timeout_millis();
        if timeout_millis <= 0 {
            return false;
        }
        self.clock.current_time_millis() > self.start_time_millis.saturating_add(timeout_millis)
    }

    pub fn before_commit_validation_required(&self) -> bool {
        let window = self
            .before_commit_validation_required_time_ms
            .load(Ordering::SeqCst);
        if window < 0 {
            return false;
        }
        self.clock
            .current_time_millis()
            .saturating_sub(self.start_time_millis)
            > window
    }

    pub fn enlisted_resource_count(&self) -> usize {
        self.xa_resources.len()
    }

    pub fn resource_entry_count(&self) -> usize {
        self.resources.len()
    }

    pub fn transaction_info(&self) -> String {
        format!("{}/{}", self.global_transaction_id, self.status())
    }

    #[cfg(test)]
    pub(crate) fn is_tracked_as_abandoned(&self) -> bool {
        self.tracker.is_armed()
    }
}

/// Run caller code, turning a panic into its message.
fn catch_panic<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string())
    })
}

fn resource_panic(message: String) -> XaError {
    XaError::new(XAER_RMFAIL, "Resource panicked.").with_source(message.into())
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.tracker.run();
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.global_transaction_id == other.global_transaction_id
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.global_transaction_id.hash(state);
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.global_transaction_id)
            .field("status", &self.status())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}
