// ============================================================================
// File: packages/vmhost/src/config/descriptor.rs
// ----------------------------------------------------------------------------
// Immutable, validated VM descriptor.
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::builder::VmConfigBuilder;
use super::errors::{ConfigResult, ValidationError};
use crate::platform::HostCapabilities;

/// How much of the guest is debuggable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebugLevel {
    /// Not debuggable
    #[default]
    None,
    /// Only the app payload is debuggable
    AppOnly,
    /// The whole guest is debuggable
    Full,
}

impl DebugLevel {
    /// Wire value
    pub fn as_i32(self) -> i32 {
        match self {
            DebugLevel::None => 0,
            DebugLevel::AppOnly => 1,
            DebugLevel::Full => 2,
        }
    }
}

impl From<DebugLevel> for i64 {
    fn from(level: DebugLevel) -> Self {
        i64::from(level.as_i32())
    }
}

impl TryFrom<i64> for DebugLevel {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DebugLevel::None),
            1 => Ok(DebugLevel::AppOnly),
            2 => Ok(DebugLevel::Full),
            other => Err(ValidationError::InvalidDebugLevel { value: other }),
        }
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DebugLevel::None => "none",
            DebugLevel::AppOnly => "app_only",
            DebugLevel::Full => "full",
        };
        f.write_str(name)
    }
}

/// Where the guest payload comes from, relative to the package root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadSource {
    /// Payload config file inside the package
    ConfigFile(String),
    /// Payload executable inside the package
    Binary(String),
}

/// Validated VM descriptor
///
/// Built once through [`VmConfigBuilder`] and never mutated. Use
/// [`VmConfig::to_builder`] to derive a modified copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    pub(crate) apk_path: PathBuf,
    pub(crate) payload: PayloadSource,
    pub(crate) debug_level: DebugLevel,
    pub(crate) protected_vm: bool,
    pub(crate) memory_mib: u64,
    pub(crate) num_cpus: u32,
}

impl VmConfig {
    /// Start a new builder
    pub fn builder() -> VmConfigBuilder {
        VmConfigBuilder::new()
    }

    /// Builder pre-filled with this descriptor's values
    pub fn to_builder(&self) -> VmConfigBuilder {
        let builder = VmConfigBuilder::new()
            .with_apk_path(self.apk_path.clone())
            .with_debug_level(self.debug_level)
            .with_protected_vm(self.protected_vm)
            .with_memory_mib(i64::try_from(self.memory_mib).unwrap_or(i64::MAX))
            .with_num_cpus(i64::from(self.num_cpus));

        match &self.payload {
            PayloadSource::ConfigFile(path) => builder.with_payload_config_path(path.clone()),
            PayloadSource::Binary(path) => builder.with_payload_binary_path(path.clone()),
        }
    }

    /// Absolute path of the package holding the payload
    pub fn apk_path(&self) -> &Path {
        &self.apk_path
    }

    /// Payload source
    pub fn payload(&self) -> &PayloadSource {
        &self.payload
    }

    /// Payload config path, when the payload is described by a config file
    pub fn payload_config_path(&self) -> Option<&str> {
        match &self.payload {
            PayloadSource::ConfigFile(path) => Some(path),
            PayloadSource::Binary(_) => None,
        }
    }

    /// Payload binary path, when the payload is a bare executable
    pub fn payload_binary_path(&self) -> Option<&str> {
        match &self.payload {
            PayloadSource::Binary(path) => Some(path),
            PayloadSource::ConfigFile(_) => None,
        }
    }

    pub fn debug_level(&self) -> DebugLevel {
        self.debug_level
    }

    pub fn is_protected_vm(&self) -> bool {
        self.protected_vm
    }

    /// Guest memory in MiB; 0 means the platform default
    pub fn memory_mib(&self) -> u64 {
        self.memory_mib
    }

    pub fn num_cpus(&self) -> u32 {
        self.num_cpus
    }

    /// Whether a session built from `other` could be reused for this one
    ///
    /// CPU count and memory size may differ; payload, debug level and
    /// protection mode may not.
    pub fn is_compatible_with(&self, other: &VmConfig) -> bool {
        self.debug_level == other.debug_level
            && self.protected_vm == other.protected_vm
            && self.payload == other.payload
            && self.apk_path == other.apk_path
    }

    /// Check the host-dependent invariants against `caps`
    pub fn check_host(&self, caps: &HostCapabilities) -> ConfigResult<()> {
        if self.num_cpus > caps.cpu_count {
            return Err(ValidationError::CpuCountOutOfRange {
                requested: i64::from(self.num_cpus),
                available: Some(caps.cpu_count),
            });
        }

        if self.protected_vm && !caps.protected_vm_supported {
            return Err(ValidationError::ProtectedVmUnsupported);
        }

        if !self.protected_vm && !caps.vm_supported {
            return Err(ValidationError::VmUnsupported);
        }

        Ok(())
    }
}
