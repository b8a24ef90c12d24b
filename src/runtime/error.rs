// ABOUTME: Error taxonomy shared by every backend adapter, plus the unified startup error.
// ABOUTME: Distinguishes connectivity, not-supported, parse and coded semantic failures.

use crate::discovery::DiscoveryError;
use crate::exec::ExecError;
use snafu::Snafu;
use std::fmt;

/// Discriminable codes for semantic failures callers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Removal refused because the container is running.
    MustStopContainer,
    /// The operation needs a running container.
    ContainerNotRunning,
    /// The object is already in the requested state.
    AlreadyInState,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::MustStopContainer => write!(f, "must stop container"),
            ErrorCode::ContainerNotRunning => write!(f, "container not running"),
            ErrorCode::AlreadyInState => write!(f, "already in requested state"),
        }
    }
}

/// Errors returned by runtime contract operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("cannot reach {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("{operation} not supported by {backend} runtime")]
    NotSupported {
        operation: &'static str,
        backend: &'static str,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{code}: {message}")]
    Coded { code: ErrorCode, message: String },

    #[error("malformed {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error(transparent)]
    Command(#[from] ExecError),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl BackendError {
    pub fn not_supported(operation: &'static str, backend: &'static str) -> Self {
        BackendError::NotSupported { operation, backend }
    }

    pub fn parse(what: impl Into<String>, reason: impl fmt::Display) -> Self {
        BackendError::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        BackendError::Coded {
            code,
            message: message.into(),
        }
    }

    /// Operation is valid in the contract but absent from this backend.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, BackendError::NotSupported { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, BackendError::Connection { .. })
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            BackendError::Coded { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Engine message text when removal is refused for a running container.
pub(crate) fn must_stop_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("stop the container before attempting removal or force remove")
        || lower.contains("cannot remove a running container")
        || (lower.contains("cannot remove container") && lower.contains("running"))
}

/// Unified error for bringing a backend up.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("engine discovery failed: {source}"))]
    Discovery { source: DiscoveryError },

    #[snafu(display("backend connection failed: {source}"))]
    Connection { source: BackendError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No engine endpoint was found.
    NoEngineFound,
    /// An explicitly requested host or context was unusable.
    InvalidOverride,
    /// SSH tunnel could not be established.
    Tunnel,
    /// An endpoint was found but could not be reached.
    ConnectionFailed,
    /// The selected backend cannot run on this platform.
    NotSupported,
    /// Any other backend failure.
    RuntimeOperation,
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Discovery { source } => match source {
                DiscoveryError::NoEngineFound { .. } => RuntimeErrorKind::NoEngineFound,
                DiscoveryError::InvalidHost { .. } | DiscoveryError::Context { .. } => {
                    RuntimeErrorKind::InvalidOverride
                }
                DiscoveryError::Tunnel(_) => RuntimeErrorKind::Tunnel,
                DiscoveryError::Validation { .. } => RuntimeErrorKind::ConnectionFailed,
            },
            RuntimeError::Connection { source } => match source {
                BackendError::Connection { .. } => RuntimeErrorKind::ConnectionFailed,
                BackendError::NotSupported { .. } => RuntimeErrorKind::NotSupported,
                _ => RuntimeErrorKind::RuntimeOperation,
            },
        }
    }
}

impl From<DiscoveryError> for RuntimeError {
    fn from(source: DiscoveryError) -> Self {
        RuntimeError::Discovery { source }
    }
}

impl From<BackendError> for RuntimeError {
    fn from(source: BackendError) -> Self {
        RuntimeError::Connection { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_supported_is_distinguishable() {
        let err = BackendError::not_supported("pod stats", "legacy");
        assert!(err.is_not_supported());
        assert_eq!(err.to_string(), "pod stats not supported by legacy runtime");
        assert!(!BackendError::Runtime("boom".into()).is_not_supported());
    }

    #[test]
    fn coded_errors_expose_code() {
        let err = BackendError::coded(ErrorCode::MustStopContainer, "container is running");
        assert_eq!(err.code(), Some(ErrorCode::MustStopContainer));
        assert_eq!(BackendError::Runtime("x".into()).code(), None);
    }

    #[test]
    fn recognises_must_stop_messages() {
        assert!(must_stop_message(
            "Error response from daemon: You cannot remove a running container abc. \
             Stop the container before attempting removal or force remove"
        ));
        assert!(!must_stop_message("no such container"));
    }

    #[test]
    fn kind_maps_connection_errors() {
        let err = RuntimeError::from(BackendError::Connection {
            endpoint: "unix:///var/run/docker.sock".into(),
            reason: "refused".into(),
        });
        assert_eq!(err.kind(), RuntimeErrorKind::ConnectionFailed);
    }
}
