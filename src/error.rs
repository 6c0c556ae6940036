//! Error type shared by every layer of the benchmark.
//!
//! Errors fall into three classes (see [`ErrorClass`]) which the suite driver
//! uses to decide whether a configuration is skipped, failed, or whether the
//! whole run has to stop.

use crate::capacity::InsufficientMemory;
use crate::layout::Precision;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BenchError>;

/// How the suite driver reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Precondition not satisfiable before any resource was committed.
    /// The configuration is skipped.
    Configuration,
    /// A backend call failed after resources were committed.
    /// The configuration is recorded as failed and the run continues.
    Execution,
    /// Unrecoverable; propagates out of the driver.
    Fatal,
}

/// Errors that can occur while planning, running or reporting a benchmark.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("requested {precision} precision, but {device} does not support it")]
    UnsupportedPrecision { precision: Precision, device: String },

    #[error(transparent)]
    InsufficientMemory(#[from] InsufficientMemory),

    #[error("{backend}: {operation} failed: {message}")]
    Backend {
        backend: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("{backend}: cannot allocate {bytes} bytes for {buffer}")]
    Allocation {
        backend: &'static str,
        buffer: &'static str,
        bytes: u64,
    },

    #[error("{operation}: host buffer holds {actual} bytes, transfer size is {expected} bytes")]
    TransferSize {
        operation: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("invalid extent {extents:?}: {reason}")]
    InvalidExtent { extents: Vec<usize>, reason: String },

    #[error("lifecycle violation: cannot run {phase} from state {state}")]
    InvalidTransition { phase: String, state: String },

    #[error("backend context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("report sink: {0}")]
    Report(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Shorthand for a failed backend call.
    pub fn backend(
        backend: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        BenchError::Backend {
            backend,
            operation,
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            BenchError::UnsupportedPrecision { .. } | BenchError::InsufficientMemory(_) => {
                ErrorClass::Configuration
            }
            BenchError::Backend { .. }
            | BenchError::Allocation { .. }
            | BenchError::TransferSize { .. } => ErrorClass::Execution,
            BenchError::InvalidExtent { .. }
            | BenchError::InvalidTransition { .. }
            | BenchError::ContextUnavailable(_)
            | BenchError::Config(_)
            | BenchError::Report(_)
            | BenchError::Io(_) => ErrorClass::Fatal,
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(e: serde_json::Error) -> Self {
        BenchError::Report(e.to_string())
    }
}

#[cfg(feature = "sqlite-report")]
impl From<rusqlite::Error> for BenchError {
    fn from(e: rusqlite::Error) -> Self {
        BenchError::Report(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_separates_skip_from_failure() {
        let skip = BenchError::UnsupportedPrecision {
            precision: Precision::Half,
            device: "cpu".into(),
        };
        assert_eq!(skip.class(), ErrorClass::Configuration);

        let fail = BenchError::backend("host", "execute_forward", "boom");
        assert_eq!(fail.class(), ErrorClass::Execution);
        assert_eq!(fail.to_string(), "host: execute_forward failed: boom");

        let fatal = BenchError::InvalidExtent {
            extents: vec![0],
            reason: "zero".into(),
        };
        assert_eq!(fatal.class(), ErrorClass::Fatal);
    }
}
