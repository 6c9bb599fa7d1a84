//! Transaction manager façade
//!
//! Collaborators (configuration, clock, statistics sink, id generator) are
//! bundled in a `TransactionContext` and passed explicitly to every
//! transaction, so tests can substitute deterministic fakes.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::GafferConfig;
use crate::error::Result;
use crate::statistics::{DefaultTransactionManagerStatistics, TransactionManagerStatistics};
use crate::transaction::Transaction;
use crate::uid::UidGenerator;

/// Collaborators shared by all transactions of one manager
#[derive(Clone)]
pub struct TransactionContext {
    config: Arc<GafferConfig>,
    clock: Arc<dyn Clock>,
    statistics: Arc<dyn TransactionManagerStatistics>,
    uid_generator: Arc<UidGenerator>,
}

impl TransactionContext {
    /// Context with the system clock and in-process counters
    pub fn new(config: GafferConfig) -> Self {
        let uid_generator = Arc::new(UidGenerator::new(config.instance_id.clone()));
        Self {
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            statistics: Arc::new(DefaultTransactionManagerStatistics::new()),
            uid_generator,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_statistics(mut self, statistics: Arc<dyn TransactionManagerStatistics>) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn config(&self) -> &GafferConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn statistics(&self) -> &Arc<dyn TransactionManagerStatistics> {
        &self.statistics
    }

    pub fn uid_generator(&self) -> &UidGenerator {
        &self.uid_generator
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new(GafferConfig::default())
    }
}

/// Creates transactions and parks them while they are off-thread
pub struct TransactionManager {
    context: TransactionContext,
}

impl TransactionManager {
    pub fn new(context: TransactionContext) -> Self {
        log::info!(
            "Transaction manager started for instance '{}'",
            context.config().instance_id
        );
        Self { context }
    }

    /// Create and start a transaction.
    ///
    /// Without an explicit timeout the configured default applies; the
    /// validation window always comes from configuration.
    pub fn begin(&self, timeout_seconds: Option<u32>) -> Result<Arc<Transaction>> {
        let config = self.context.config();
        let transaction = Transaction::new(&self.context);
        transaction.begin(
            timeout_seconds.or(config.default_timeout_seconds),
            config.before_commit_validation_required_time_ms,
        )?;
        self.context.statistics().mark_begin();
        Ok(Arc::new(transaction))
    }

    pub fn suspend(&self, transaction: &Transaction) {
        log::debug!("Suspending transaction '{}'.", transaction.transaction_info());
        transaction.set_suspended(true);
    }

    pub fn resume(&self, transaction: &Transaction) {
        log::debug!("Resuming transaction '{}'.", transaction.transaction_info());
        transaction.set_suspended(false);
    }

    pub fn statistics(&self) -> &Arc<dyn TransactionManagerStatistics> {
        self.context.statistics()
    }

    pub fn context(&self) -> &TransactionContext {
        &self.context
    }
}
