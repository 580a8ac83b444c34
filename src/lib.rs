// ============================================================================
// File: packages/vmhost/src/lib.rs
// ----------------------------------------------------------------------------
// Host-side control plane for isolated virtual machine sessions.
//
// A caller describes a VM with a validated VmConfig, hands it to a
// LifecycleController that drives one session against the external VM
// service, and talks to the guest over vsock using the framed
// ControlChannel. DataSync layers clipboard and URL sharing on top.
// ============================================================================

pub mod async_task;
pub mod channel;
pub mod config;
pub mod datasync;
pub mod lifecycle;
pub mod platform;

#[cfg(test)]
pub(crate) mod test_support;

pub use async_task::{AsyncTask, AsyncTaskBuilder};
pub use channel::{ChannelError, ChannelResult, ControlChannel, Frame, FrameType};
pub use config::{
    DebugLevel, FormatError, PayloadSource, RemoteConfig, ValidationError, VmConfig,
    VmConfigBuilder,
};
pub use datasync::{DataSync, HostClipboard, MemoryClipboard, PullOutcome, SyncError};
pub use lifecycle::{
    ControllerOptions, LifecycleController, RemoteVm, VirtualizationService, VmCallback, VmError,
    VmState,
};
pub use platform::HostCapabilities;
