// ============================================================================
// File: packages/vmhost/src/datasync/mod.rs
// ----------------------------------------------------------------------------
// Clipboard and URL sharing with the guest over the control channel.
// ============================================================================

mod clipboard;
mod errors;
mod sync;


#[cfg(feature = "system-clipboard")]
pub use clipboard::SystemClipboard;
pub use clipboard::{HostClipboard, MemoryClipboard};
pub use errors::{SyncError, SyncResult};
pub use sync::{DataSync, PullOutcome, DATA_SHARING_PORT};
