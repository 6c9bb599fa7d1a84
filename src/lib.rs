//! Gaffer - a lightweight local transaction coordinator
//!
//! Gaffer exposes the programming model of a distributed transaction manager
//! (begin, enlist, delist, commit, rollback, rollback-only marking,
//! completion synchronizations, abandonment tracking) while committing with a
//! single one-phase commit per enlisted resource. There is no prepare phase,
//! no recovery log and no two-phase commit.
//!
//! Architecture Overview:
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application code                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Transaction Manager                        │
//! │      (creates transactions, suspends / resumes them)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Transaction                             │
//! │   (state machine, commit pipeline, rollback pipeline)       │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                    │
//!          ▼                   ▼                    ▼
//! ┌────────────────┐ ┌───────────────────┐ ┌────────────────────┐
//! │   Resources    │ │  Synchronizations │ │ Abandonment tracker│
//! │ (ordered, 1PC) │ │ (ordinary, inter- │ │ (fires on drop)    │
//! │                │ │  posed)           │ │                    │
//! └────────────────┘ └───────────────────┘ └────────────────────┘
//!
//! Collaborators (clock, statistics sink, configuration) are passed in
//! explicitly through a [`TransactionContext`].

pub mod clock;
pub mod config;
mod cow;
pub mod error;
pub mod manager;
pub mod resource;
mod resource_map;
pub mod statistics;
pub mod status;
pub mod synchronization;
mod tracker;
pub mod transaction;
pub mod uid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GafferConfig;
pub use error::{BoxError, GafferError, Result};
pub use manager::{TransactionContext, TransactionManager};
pub use resource::{
    OrderedResource, ResourceHandle, ResourceKind, ValidatableResource, XaError, XaResource,
};
pub use resource_map::ResourceValue;
pub use statistics::{
    DefaultTransactionManagerStatistics, StatisticsSnapshot, TransactionManagerStatistics,
};
pub use status::TransactionStatus;
pub use synchronization::{Synchronization, SynchronizationHandle};
pub use transaction::Transaction;
pub use uid::{Uid, UidGenerator};
