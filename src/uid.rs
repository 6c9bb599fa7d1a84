//! Global transaction identifiers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Global transaction id.
///
/// Carries the instance tag, the creation time and a sequence number so that
/// two transactions created in the same millisecond on the same instance
/// still compare unequal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid {
    instance_id: String,
    start_time_millis: i64,
    sequence: u64,
}

impl Uid {
    pub fn new(instance_id: impl Into<String>, start_time_millis: i64, sequence: u64) -> Self {
        Self {
            instance_id: instance_id.into(),
            start_time_millis,
            sequence,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn start_time_millis(&self) -> i64 {
        self.start_time_millis
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.instance_id, self.start_time_millis, self.sequence)
    }
}

/// Mints `Uid`s for one instance
#[derive(Debug)]
pub struct UidGenerator {
    instance_id: String,
    next_sequence: AtomicU64,
}

impl UidGenerator {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            next_sequence: AtomicU64::new(1),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn generate(&self, start_time_millis: i64) -> Uid {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        Uid::new(self.instance_id.clone(), start_time_millis, sequence)
    }
}
