// ============================================================================
// File: packages/vmhost/src/config/mod.rs
// ----------------------------------------------------------------------------
// VM descriptor: construction, validation, persistence and remote projection.
//
// - builder: fail-fast construction of an immutable VmConfig
// - descriptor: the validated value object and its compatibility predicate
// - persist: versioned key/value persisted form
// - remote: hand-off to the VM service as opened handles
// ============================================================================

mod builder;
mod descriptor;
mod errors;
mod persist;
mod remote;


pub use builder::VmConfigBuilder;
pub use descriptor::{DebugLevel, PayloadSource, VmConfig};
pub use errors::{ConfigResult, FormatError, FormatResult, ValidationError};
pub use persist::CONFIG_VERSION;
pub use remote::{RemoteConfig, RemotePayload};
