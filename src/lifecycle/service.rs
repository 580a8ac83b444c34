// ============================================================================
// File: packages/vmhost/src/lifecycle/service.rs
// ----------------------------------------------------------------------------
// Interface of the external VM management service.
//
// This crate is a client of these traits; the hypervisor-side
// implementation lives elsewhere. Every call returns an AsyncTask so the
// traits stay object-safe.
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::async_task::AsyncTask;
use crate::config::RemoteConfig;
use crate::platform::HostCapabilities;

use super::callback::Delivery;
use super::errors::RemoteResult;
use super::state::{RemoteEvent, VmState};

/// Duplex byte stream to the guest
pub trait VsockIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> VsockIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Boxed vsock connection as handed out by [`RemoteVm::connect_vsock`]
pub type VsockStream = Box<dyn VsockIo>;

/// Where the VM service sends asynchronous events for one session
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Delivery>) -> Self {
        Self { tx }
    }

    /// Queue an event for the session; false once the session is gone
    pub fn emit(&self, event: RemoteEvent) -> bool {
        self.tx.send(Delivery::Remote(event)).is_ok()
    }
}

/// Handle to one VM owned by the VM service
pub trait RemoteVm: Send + Sync + fmt::Debug {
    /// Context identifier of the guest on the vsock address space
    fn cid(&self) -> u32;

    /// State as the service sees it
    fn state(&self) -> AsyncTask<RemoteResult<VmState>>;

    /// Route asynchronous events for this VM to `sink`
    fn register_callback(&self, sink: EventSink) -> AsyncTask<RemoteResult<()>>;

    /// Begin booting; completion is signalled with [`RemoteEvent::Booted`]
    fn start(&self) -> AsyncTask<RemoteResult<()>>;

    /// Begin shutdown; completion is signalled with [`RemoteEvent::Died`]
    fn stop(&self) -> AsyncTask<RemoteResult<()>>;

    fn suspend(&self) -> AsyncTask<RemoteResult<()>>;

    fn resume(&self) -> AsyncTask<RemoteResult<()>>;

    /// Current balloon size in bytes
    fn memory_balloon(&self) -> AsyncTask<RemoteResult<u64>>;

    fn set_memory_balloon(&self, bytes: u64) -> AsyncTask<RemoteResult<()>>;

    /// Open a new stream connection to `port` on the guest
    ///
    /// The service may cap the number of concurrent connections.
    fn connect_vsock(&self, port: u32) -> AsyncTask<RemoteResult<VsockStream>>;

    fn set_host_console_name(&self, name: String) -> AsyncTask<RemoteResult<()>>;
}

/// VM management service
pub trait VirtualizationService: Send + Sync + fmt::Debug {
    /// What this service can run
    fn capabilities(&self) -> HostCapabilities;

    /// Allocate a VM described by `config`
    fn create_vm(&self, config: RemoteConfig) -> AsyncTask<RemoteResult<Arc<dyn RemoteVm>>>;
}
