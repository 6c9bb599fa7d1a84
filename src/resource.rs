//! Resources that can be enlisted in a transaction
//!
//! A resource is committed with one-phase commit or rolled back when the
//! transaction completes. Two optional capabilities refine how the
//! coordinator treats it:
//! - **Ordered**: an integer order; resources are completed in ascending
//!   order and resources without one go last.
//! - **Validatable**: a liveness probe run before commit once the
//!   transaction has been open longer than the validation window.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::uid::Uid;

/// Dissociate caller from the resource - successful.
pub const TMSUCCESS: i32 = 0x0400_0000;

/// Dissociate caller from the resource - failed.
pub const TMFAIL: i32 = 0x2000_0000;

/// Caller is suspending (not ending) its association with the resource.
pub const TMSUSPEND: i32 = 0x0200_0000;

/// Rollback was caused by unspecified reason.
pub const XA_RBROLLBACK: i32 = 100;

/// Resource manager error.
pub const XAER_RMERR: i32 = -3;

/// Resource manager unavailable.
pub const XAER_RMFAIL: i32 = -7;

/// Which protocol family a resource speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A locally managed resource (e.g. a wrapped database connection)
    /// that supports one-phase commit only
    Local,
    /// A full two-phase XA participant
    Xa,
}

/// Failure reported by a resource
#[derive(Debug)]
pub struct XaError {
    code: i32,
    message: String,
    source: Option<BoxError>,
}

impl XaError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn resource_manager(message: impl Into<String>) -> Self {
        Self::new(XAER_RMERR, message)
    }

    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

impl fmt::Display for XaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (xa error code {})", self.message, self.code)
    }
}

impl StdError for XaError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn StdError + 'static))
    }
}

/// Resource with an explicit completion order
pub trait OrderedResource {
    fn order(&self) -> i32;
}

/// Resource whose liveness can be probed before commit
pub trait ValidatableResource {
    fn is_valid(&self) -> Result<bool, BoxError>;
}

/// A participant in a transaction.
///
/// `commit` is always invoked with `one_phase = true` by this coordinator.
/// Only resources whose `kind` is `ResourceKind::Local` can be enlisted, so
/// implementations must override the `Xa` default.
pub trait XaResource: fmt::Debug + Send + Sync {
    fn commit(&self, xid: Option<&Uid>, one_phase: bool) -> Result<(), XaError>;

    fn rollback(&self, xid: Option<&Uid>) -> Result<(), XaError>;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Xa
    }

    fn as_ordered(&self) -> Option<&dyn OrderedResource> {
        None
    }

    fn as_validatable(&self) -> Option<&dyn ValidatableResource> {
        None
    }
}

/// Shared handle to an enlisted resource. Identity is pointer identity.
pub type ResourceHandle = Arc<dyn XaResource>;

/// Completion order of a resource; resources without one sort last.
pub(crate) fn completion_order(resource: &dyn XaResource) -> i32 {
    resource.as_ordered().map_or(i32::MAX, |o| o.order())
}

/// Pointer identity of two handles, ignoring vtables.
pub(crate) fn same_resource(a: &ResourceHandle, b: &ResourceHandle) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Resources in ascending completion order, ties kept in enlistment order.
pub(crate) fn sorted_resources(resources: &[ResourceHandle]) -> Vec<ResourceHandle> {
    let mut sorted = resources.to_vec();
    sorted.sort_by_key(|r| completion_order(r.as_ref()));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named {
        name: &'static str,
        order: Option<i32>,
    }

    impl OrderedResource for Named {
        fn order(&self) -> i32 {
            self.order.unwrap_or_default()
        }
    }

    impl XaResource for Named {
        fn commit(&self, _xid: Option<&Uid>, _one_phase: bool) -> Result<(), XaError> {
            Ok(())
        }

        fn rollback(&self, _xid: Option<&Uid>) -> Result<(), XaError> {
            Ok(())
        }

        fn as_ordered(&self) -> Option<&dyn OrderedResource> {
            self.order.map(|_| self as &dyn OrderedResource)
        }
    }

    fn handle(name: &'static str, order: Option<i32>) -> ResourceHandle {
        Arc::new(Named { name, order })
    }

    fn names(resources: &[ResourceHandle]) -> Vec<String> {
        resources.iter().map(|r| format!("{:?}", r)).collect()
    }

    #[test]
    fn test_ascending_order_unordered_last() {
        let resources = vec![handle("a", Some(10)), handle("b", Some(-1)), handle("c", None)];
        let sorted = sorted_resources(&resources);
        let expected = vec![
            format!("{:?}", resources[1]),
            format!("{:?}", resources[0]),
            format!("{:?}", resources[2]),
        ];
        assert_eq!(names(&sorted), expected);
    }

    #[test]
    fn test_ties_keep_enlistment_order() {
        let resources = vec![handle("x", Some(5)), handle("y", None), handle("z", Some(5))];
        let sorted = sorted_resources(&resources);
        assert!(same_resource(&sorted[0], &resources[0]));
        assert!(same_resource(&sorted[1], &resources[2]));
        assert!(same_resource(&sorted[2], &resources[1]));
        assert!(!same_resource(&sorted[0], &resources[1]));
    }

    #[test]
    fn test_default_kind_is_xa() {
        let resource = Named { name: "plain", order: None };
        assert_eq!(resource.kind(), ResourceKind::Xa);
        assert!(resource.as_validatable().is_none());
        assert_eq!(completion_order(&resource), i32::MAX);
        assert_eq!(resource.name, "plain");
    }

    #[test]
    fn test_xa_error_display() {
        let err = XaError::resource_manager("connection reset");
        assert_eq!(err.code(), XAER_RMERR);
        assert_eq!(err.to_string(), "connection reset (xa error code -3)");
    }
}
