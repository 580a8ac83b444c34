// ============================================================================
// File: packages/vmhost/src/channel/errors.rs
// ----------------------------------------------------------------------------
// Control channel error types
// ============================================================================

use std::io;

/// Framing errors on a control channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Peer closed the connection before a whole frame was transferred
    #[error("Control channel closed")]
    ChannelClosed,

    /// Header carried a type byte this side does not know
    ///
    /// The payload has already been drained, so the stream stays aligned.
    #[error("Unknown frame type {type_byte:#04x} ({payload_len} payload bytes discarded)")]
    UnknownFrameType { type_byte: u8, payload_len: u32 },

    /// Payload does not fit the 32-bit length field
    #[error("Frame payload of {len} bytes exceeds the 32-bit length field")]
    PayloadTooLarge { len: usize },

    /// Transport failure other than closure
    #[error("Control channel I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl ChannelError {
    /// Classify a transport error, folding closure kinds into `ChannelClosed`
    pub(crate) fn from_transport(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => ChannelError::ChannelClosed,
            _ => ChannelError::Io(err),
        }
    }
}

/// Result type for control channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;
