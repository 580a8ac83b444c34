// ============================================================================
// File: packages/vmhost/src/config/errors.rs
// ----------------------------------------------------------------------------
// Descriptor validation and persisted-form decode errors
// ============================================================================

use std::path::PathBuf;

/// Descriptor construction errors
///
/// Each variant names exactly one violated invariant. Construction either
/// succeeds completely or fails with one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No package path was given
    #[error("APK path must be set")]
    MissingApkPath,

    /// Package path is not absolute
    #[error("APK path must be an absolute path: {}", path.display())]
    RelativeApkPath { path: PathBuf },

    /// Package path cannot be persisted as text
    #[error("APK path is not valid UTF-8: {}", path.display())]
    NonUtf8ApkPath { path: PathBuf },

    /// Neither a payload config path nor a payload binary path was given
    #[error("Exactly one of payload config path or payload binary path must be set, got none")]
    MissingPayloadSource,

    /// Both payload sources were given
    #[error("Exactly one of payload config path or payload binary path must be set, got both")]
    ConflictingPayloadSource,

    /// Memory size below zero
    #[error("Memory size cannot be negative: {mib} MiB")]
    NegativeMemory { mib: i64 },

    /// CPU count outside 1..=available; `available` is unknown when no host
    /// capabilities were given
    #[error("Number of vCPUs ({requested}) is out of range [1, {}]", cpu_limit(available))]
    CpuCountOutOfRange {
        requested: i64,
        available: Option<u32>,
    },

    /// Debug level is not one of the defined values
    #[error("Invalid debug level: {value}")]
    InvalidDebugLevel { value: i64 },

    /// Protection mode was never chosen
    #[error("Protected VM mode must be set explicitly")]
    ProtectedModeUnset,

    /// Host cannot run protected VMs
    #[error("Protected VMs are not supported on this host")]
    ProtectedVmUnsupported,

    /// Host cannot run VMs at all
    #[error("Non-protected VMs are not supported on this host")]
    VmUnsupported,

    /// Package file could not be opened for hand-off
    #[error("Failed to open APK {}: {details}", path.display())]
    ApkUnreadable { path: PathBuf, details: String },
}

fn cpu_limit(available: &Option<u32>) -> String {
    match available {
        Some(max) => max.to_string(),
        None => "host CPUs".to_string(),
    }
}

/// Persisted-form decode errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Record was written by a newer implementation
    #[error("Config version {found} is newer than supported version {supported}")]
    VersionTooNew { found: i64, supported: i64 },

    /// A required key is absent
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    /// An enum-valued key holds an undefined value
    #[error("Invalid value {value} for field '{field}'")]
    InvalidEnum { field: &'static str, value: i64 },

    /// Record is not a well-formed key/value object
    #[error("Malformed config record: {details}")]
    Malformed { details: String },

    /// Record decoded but describes an invalid VM
    #[error("Invalid config record: {0}")]
    Invalid(#[from] ValidationError),
}

/// Result type for descriptor construction
pub type ConfigResult<T> = Result<T, ValidationError>;

/// Result type for persisted-form decoding
pub type FormatResult<T> = Result<T, FormatError>;
