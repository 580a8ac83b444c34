// ============================================================================
// File: packages/vmhost/src/datasync/errors.rs
// ----------------------------------------------------------------------------
// Data sync error types
// ============================================================================

use crate::channel::ChannelError;
use crate::lifecycle::VmError;

/// Failures while exchanging clipboard or URL data with the guest
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Connection could not be opened
    #[error("Cannot reach the guest data service: {0}")]
    Vm(#[from] VmError),

    /// Framing failed mid-exchange
    #[error("Data sync channel failed: {0}")]
    Channel(#[from] ChannelError),

    /// Guest sent clipboard text that is not UTF-8
    #[error("Guest clipboard text is not valid UTF-8 ({len} bytes)")]
    InvalidUtf8 { len: usize },

    /// Host clipboard refused the operation
    #[error("Host clipboard unavailable: {details}")]
    Clipboard { details: String },
}

/// Result type for data sync operations
pub type SyncResult<T> = Result<T, SyncError>;
