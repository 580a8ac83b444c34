// ============================================================================
// File: packages/vmhost/src/datasync/clipboard.rs
// ----------------------------------------------------------------------------
// Host clipboard access
// ============================================================================

use std::sync::Mutex;

#[cfg(feature = "system-clipboard")]
use super::errors::SyncError;
use super::errors::SyncResult;

/// Plain-text clipboard on the host side
pub trait HostClipboard: Send + Sync {
    /// Current text, `None` when the clipboard holds no text
    fn text(&self) -> Option<String>;

    /// Replace the clipboard contents
    fn set_text(&self, text: String) -> SyncResult<()>;
}

/// Process-local clipboard
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text<T: Into<String>>(text: T) -> Self {
        Self {
            text: Mutex::new(Some(text.into())),
        }
    }
}

impl HostClipboard for MemoryClipboard {
    fn text(&self) -> Option<String> {
        match self.text.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_text(&self, text: String) -> SyncResult<()> {
        match self.text.lock() {
            Ok(mut guard) => *guard = Some(text),
            Err(poisoned) => *poisoned.into_inner() = Some(text),
        }
        Ok(())
    }
}

/// Desktop clipboard of the host session
#[cfg(feature = "system-clipboard")]
pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

#[cfg(feature = "system-clipboard")]
impl SystemClipboard {
    pub fn new() -> SyncResult<Self> {
        let inner = arboard::Clipboard::new().map_err(|e| SyncError::Clipboard {
            details: e.to_string(),
        })?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

#[cfg(feature = "system-clipboard")]
impl HostClipboard for SystemClipboard {
    fn text(&self) -> Option<String> {
        let mut clipboard = self.inner.lock().ok()?;
        match clipboard.get_text() {
            Ok(text) => Some(text),
            Err(arboard::Error::ContentNotAvailable) => None,
            Err(e) => {
                log::warn!("host clipboard read failed: {e}");
                None
            }
        }
    }

    fn set_text(&self, text: String) -> SyncResult<()> {
        let mut clipboard = self.inner.lock().map_err(|_| SyncError::Clipboard {
            details: "clipboard lock poisoned".to_string(),
        })?;
        clipboard.set_text(text).map_err(|e| SyncError::Clipboard {
            details: e.to_string(),
        })
    }
}
