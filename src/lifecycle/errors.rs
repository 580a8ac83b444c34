// ============================================================================
// File: packages/vmhost/src/lifecycle/errors.rs
// ----------------------------------------------------------------------------
// Lifecycle and remote-service error types
// ============================================================================

use std::fmt;

use crate::config::ValidationError;

use super::state::VmState;

/// Machine-readable reason the VM service gave for rejecting a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// Service is not reachable
    ServiceUnavailable,
    /// Caller lacks permission
    PermissionDenied,
    /// Service ran out of VMs, memory or CIDs
    ResourceExhausted,
    /// Operation not supported by this VM or platform
    Unsupported,
    /// Service rejected an argument
    InvalidArgument,
    /// Anything else, including a crashed request task
    Internal,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteErrorKind::ServiceUnavailable => "service unavailable",
            RemoteErrorKind::PermissionDenied => "permission denied",
            RemoteErrorKind::ResourceExhausted => "resource exhausted",
            RemoteErrorKind::Unsupported => "unsupported",
            RemoteErrorKind::InvalidArgument => "invalid argument",
            RemoteErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// Error reported by the VM service itself
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new<M: Into<String>>(kind: RemoteErrorKind, message: M) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result type returned by VM service calls
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Session-level errors
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Operation is not allowed from the current state
    #[error("Cannot {operation} a VM that is {state}")]
    IllegalStateTransition {
        operation: &'static str,
        state: VmState,
    },

    /// VM service rejected the call
    #[error("VM service rejected {operation} ({kind}): {message}")]
    RemoteFailure {
        operation: &'static str,
        kind: RemoteErrorKind,
        message: String,
    },

    /// VM service could not allocate a VM
    #[error("Failed to create VM ({kind}): {message}")]
    CreationFailed {
        kind: RemoteErrorKind,
        message: String,
    },

    /// Expected terminal notification never arrived; session forced to DEAD
    #[error("Lifecycle inconsistency: {details}")]
    LifecycleInconsistency { details: String },

    /// Operation needs a running VM
    #[error("VM is not running (state: {state})")]
    NotRunning { state: VmState },

    /// Descriptor cannot be used on this host or handed to the service
    #[error("Invalid VM config: {0}")]
    InvalidConfig(#[from] ValidationError),
}

impl VmError {
    pub(crate) fn remote(operation: &'static str, err: RemoteError) -> Self {
        VmError::RemoteFailure {
            operation,
            kind: err.kind,
            message: err.message,
        }
    }

    /// Sub-reason for remote and creation failures
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            VmError::RemoteFailure { kind, .. } | VmError::CreationFailed { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        }
    }
}

/// Result type for session operations
pub type VmResult<T> = Result<T, VmError>;
