// ============================================================================
// File: packages/vmhost/src/datasync/sync.rs
// ----------------------------------------------------------------------------
// Clipboard replication and URL hand-off with the guest data service.
//
// Each operation opens its own vsock connection, exchanges at most one
// request and one response, and closes it again.
// ============================================================================

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::{ChannelError, ControlChannel, Frame, FrameType};
use crate::lifecycle::{LifecycleController, VsockStream};

use super::clipboard::HostClipboard;
use super::errors::{SyncError, SyncResult};

/// Well-known guest port of the data sharing service
pub const DATA_SHARING_PORT: u32 = 3580;

/// What a clipboard pull did to the host clipboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Guest text was installed on the host
    Updated,
    /// Guest clipboard is empty; host clipboard left alone
    Empty,
    /// Guest answered with something other than clipboard data
    Ignored,
}

/// Host side of the guest data sharing protocol
pub struct DataSync {
    controller: Arc<LifecycleController>,
    clipboard: Arc<dyn HostClipboard>,
    port: u32,
}

impl DataSync {
    pub fn new(controller: Arc<LifecycleController>, clipboard: Arc<dyn HostClipboard>) -> Self {
        Self {
            controller,
            clipboard,
            port: DATA_SHARING_PORT,
        }
    }

    /// Talk to the data service on `port` instead of the well-known one
    pub fn with_port(mut self, port: u32) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    async fn connect(&self) -> SyncResult<ControlChannel<VsockStream>> {
        let stream = self.controller.connect_vsock(self.port).await?;
        Ok(ControlChannel::new(stream))
    }

    /// Copy the host clipboard into the guest
    ///
    /// Returns false without touching the guest when the host clipboard holds
    /// no text or an empty string, so the guest clipboard is never cleared by
    /// a push.
    pub async fn push_clipboard(&self) -> SyncResult<bool> {
        let Some(text) = self.clipboard.text().filter(|text| !text.is_empty()) else {
            log::debug!("host clipboard is empty; nothing to push");
            return Ok(false);
        };

        let mut payload = BytesMut::with_capacity(text.len() + 1);
        payload.put_slice(text.as_bytes());
        payload.put_u8(0);

        let mut channel = self.connect().await?;
        channel
            .write_frame(FrameType::WriteText, payload.freeze())
            .await?;
        close_quietly(&mut channel).await;

        log::debug!(
            "pushed {} bytes of clipboard text to vm {}",
            text.len(),
            self.controller.cid()
        );
        Ok(true)
    }

    /// Copy the guest clipboard onto the host
    pub async fn pull_clipboard(&self) -> SyncResult<PullOutcome> {
        let mut channel = self.connect().await?;
        let response = channel.exchange(FrameType::ReadRequest, Bytes::new()).await;
        close_quietly(&mut channel).await;

        let frame = match response {
            Ok(frame) => frame,
            Err(ChannelError::UnknownFrameType { type_byte, .. }) => {
                log::error!("unknown clipboard response type {type_byte:#04x}");
                return Ok(PullOutcome::Ignored);
            }
            Err(e) => return Err(e.into()),
        };

        self.install(frame)
    }

    fn install(&self, frame: Frame) -> SyncResult<PullOutcome> {
        match frame.frame_type {
            FrameType::WriteEmpty => {
                log::debug!("guest clipboard is empty");
                Ok(PullOutcome::Empty)
            }
            FrameType::WriteText => {
                let mut bytes = frame.payload.as_ref();
                if let [head @ .., 0] = bytes {
                    bytes = head;
                }
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| SyncError::InvalidUtf8 { len: bytes.len() })?;
                self.clipboard.set_text(text.to_string())?;
                log::debug!("installed {} bytes of guest clipboard text", text.len());
                Ok(PullOutcome::Updated)
            }
            other => {
                log::error!("unexpected clipboard response {other}");
                Ok(PullOutcome::Ignored)
            }
        }
    }

    /// Ask the guest to open `url`; no response is expected
    pub async fn push_url(&self, url: &str) -> SyncResult<()> {
        let mut channel = self.connect().await?;
        channel
            .write_frame(FrameType::OpenUrl, Bytes::copy_from_slice(url.as_bytes()))
            .await?;
        close_quietly(&mut channel).await;
        log::debug!("sent URL to vm {}", self.controller.cid());
        Ok(())
    }

    /// Sync on a host focus change: push when gaining focus, pull when losing it
    pub async fn sync_on_focus(&self, focused: bool) -> SyncResult<()> {
        if focused {
            self.push_clipboard().await.map(|_| ())
        } else {
            self.pull_clipboard().await.map(|_| ())
        }
    }
}

async fn close_quietly(channel: &mut ControlChannel<VsockStream>) {
    if let Err(e) = channel.close().await {
        log::debug!("data sync connection close: {e}");
    }
}
