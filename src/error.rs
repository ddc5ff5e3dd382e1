//! Error type shared by every layer of the harness.

use core::fmt;
use std::error::Error;
use std::panic::Location;

use crate::backend::Status;

/// Errors that abort a benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchError {
    /// A backend call returned a non-success status.
    Backend {
        call: &'static str,
        status: Status,
        file: &'static str,
        line: u32,
    },
    /// Extent with zero axes, more than three axes, or a zero-length axis.
    InvalidExtent(String),
    /// Requested device index is not in the device list.
    UnknownDevice { requested: usize, available: usize },
    /// Host slice is smaller than the transfer it takes part in.
    HostBuffer { expected: usize, actual: usize },
    /// Engine operation called in a state that does not allow it.
    Lifecycle {
        operation: &'static str,
        state: &'static str,
    },
    /// Engine requested before the context was created.
    ContextNotCreated,
    /// Invalid run configuration.
    Config(String),
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Backend {
                call,
                status,
                file,
                line,
            } => write!(
                f,
                "FFT backend error {call} {} [{}] {file}:{line}",
                status.name(),
                status.code()
            ),
            BenchError::InvalidExtent(msg) => write!(f, "invalid extent: {msg}"),
            BenchError::UnknownDevice {
                requested,
                available,
            } => write!(
                f,
                "device {requested} unknown ({available} device(s) available)"
            ),
            BenchError::HostBuffer { expected, actual } => write!(
                f,
                "host buffer holds {actual} bytes but the transfer needs {expected}"
            ),
            BenchError::Lifecycle { operation, state } => {
                write!(f, "`{operation}` is not allowed while {state}")
            }
            BenchError::ContextNotCreated => write!(f, "context has not been created"),
            BenchError::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl Error for BenchError {}

/// Convert a backend status into a fatal error tagged with the caller's
/// source location.
#[track_caller]
pub fn check<T>(result: Result<T, Status>, call: &'static str) -> Result<T, BenchError> {
    let location = Location::caller();
    result.map_err(|status| {
        BenchError::Backend {
            call,
            status,
            file: location.file(),
            line: location.line(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_records_call_site() {
        let err = check::<()>(Err(Status::InvalidPlan), "destroy_plan").unwrap_err();
        match &err {
            BenchError::Backend {
                call, status, file, ..
            } => {
                assert_eq!(*call, "destroy_plan");
                assert_eq!(*status, Status::InvalidPlan);
                assert!(file.ends_with("error.rs"), "file = {file}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("FFT_INVALID_PLAN"), "{msg}");
        assert!(msg.contains("[1]"), "{msg}");
    }

    #[test]
    fn check_passes_values_through() {
        assert_eq!(check(Ok::<_, Status>(7usize), "plan_work_size"), Ok(7));
    }
}
