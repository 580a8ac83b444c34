// ============================================================================
// File: packages/vmhost/src/lifecycle/mod.rs
// ----------------------------------------------------------------------------
// VM session lifecycle.
//
// - LifecycleController owns one remote VM and its session state
// - VirtualizationService / RemoteVm describe the external VM service
// - VmCallback observers receive ordered notifications on a delivery task
// ============================================================================

mod callback;
mod controller;
mod errors;
mod options;
mod service;
mod state;

pub use callback::VmCallback;
pub use controller::LifecycleController;
pub use errors::{RemoteError, RemoteErrorKind, RemoteResult, VmError, VmResult};
pub use options::{ControllerOptions, DEFAULT_STOP_GRACE_PERIOD};
pub use service::{EventSink, RemoteVm, VirtualizationService, VsockIo, VsockStream};
pub use state::{DeathReason, RemoteEvent, VmState};
