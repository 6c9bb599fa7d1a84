//! Error types for Gaffer
//!
//! Defines the error taxonomy observed by callers of a transaction, and the
//! reporter that every failure site funnels through.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Boxed error produced by resources, synchronizations and other
/// caller-supplied collaborators.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Unified error type for Gaffer operations
#[derive(Debug)]
pub enum GafferError {
    /// A lifecycle guard was violated; the transaction was not touched
    IllegalState(String),
    /// Invalid input, e.g. an empty resource key
    IllegalArgument(String),
    /// Commit was refused and the transaction has been rolled back
    Rollback {
        message: String,
        cause: Option<BoxError>,
    },
    /// Some resources committed and at least one did not
    HeuristicMixed {
        message: String,
        cause: Option<BoxError>,
    },
    /// Unexpected failure while rolling back
    Runtime {
        message: String,
        cause: Option<BoxError>,
    },
    /// Configuration could not be read
    Io(io::Error),
    /// Configuration could not be parsed
    Config(String),
}

impl GafferError {
    pub fn illegal_state(message: impl Into<String>) -> Self {
        GafferError::IllegalState(message.into())
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        GafferError::IllegalArgument(message.into())
    }

    pub fn rollback(message: impl Into<String>) -> Self {
        GafferError::Rollback {
            message: message.into(),
            cause: None,
        }
    }

    pub fn rollback_caused_by(message: impl Into<String>, cause: BoxError) -> Self {
        GafferError::Rollback {
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub fn heuristic_mixed(message: impl Into<String>, cause: BoxError) -> Self {
        GafferError::HeuristicMixed {
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        GafferError::Runtime {
            message: message.into(),
            cause: None,
        }
    }

    pub fn runtime_caused_by(message: impl Into<String>, cause: BoxError) -> Self {
        GafferError::Runtime {
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Wrap any other error as a runtime failure. Runtime errors pass through untouched.
    pub fn wrap_runtime(err: GafferError) -> Self {
        match err {
            GafferError::Runtime { .. } => err,
            other => GafferError::Runtime {
                message: other.to_string(),
                cause: Some(Box::new(other)),
            },
        }
    }

    pub fn is_illegal_state(&self) -> bool {
        matches!(self, GafferError::IllegalState(_))
    }

    pub fn is_rollback(&self) -> bool {
        matches!(self, GafferError::Rollback { .. })
    }

    pub fn is_heuristic_mixed(&self) -> bool {
        matches!(self, GafferError::HeuristicMixed { .. })
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, GafferError::Runtime { .. })
    }

    /// Chained cause, if the failure wraps one
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            GafferError::Rollback { cause, .. }
            | GafferError::HeuristicMixed { cause, .. }
            | GafferError::Runtime { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }

    /// Short name of the error kind, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            GafferError::IllegalState(_) => "IllegalState",
            GafferError::IllegalArgument(_) => "IllegalArgument",
            GafferError::Rollback { .. } => "Rollback",
            GafferError::HeuristicMixed { .. } => "HeuristicMixed",
            GafferError::Runtime { .. } => "Runtime",
            GafferError::Io(_) => "Io",
            GafferError::Config(_) => "Config",
        }
    }
}

impl fmt::Display for GafferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GafferError::IllegalState(msg) => write!(f, "{}", msg),
            GafferError::IllegalArgument(msg) => write!(f, "{}", msg),
            GafferError::Rollback { message, .. } => write!(f, "{}", message),
            GafferError::HeuristicMixed { message, .. } => write!(f, "{}", message),
            GafferError::Runtime { message, .. } => write!(f, "{}", message),
            GafferError::Io(e) => write!(f, "{}", e),
            GafferError::Config(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for GafferError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            GafferError::Io(e) => Some(e),
            GafferError::Rollback { cause, .. }
            | GafferError::HeuristicMixed { cause, .. }
            | GafferError::Runtime { cause, .. } => {
                cause.as_deref().map(|c| c as &(dyn StdError + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for GafferError {
    fn from(e: io::Error) -> Self {
        GafferError::Io(e)
    }
}

impl From<serde_json::Error> for GafferError {
    fn from(e: serde_json::Error) -> Self {
        GafferError::Config(e.to_string())
    }
}

/// Result type alias for Gaffer operations
pub type Result<T> = std::result::Result<T, GafferError>;

/// Single choke point for errors leaving a transaction.
///
/// When `log_exceptions` is on, every raised error is logged before it is
/// handed back to the caller.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReporter {
    log_exceptions: bool,
}

impl ErrorReporter {
    pub fn new(log_exceptions: bool) -> Self {
        Self { log_exceptions }
    }

    pub fn log_exceptions(&self) -> bool {
        self.log_exceptions
    }

    pub fn raise(&self, err: GafferError) -> GafferError {
        if self.log_exceptions {
            match err.cause() {
                Some(cause) => log::error!("{}: {} (caused by: {})", err.kind(), err, cause),
                None => log::error!("{}: {}", err.kind(), err),
            }
        }
        err
    }
}
