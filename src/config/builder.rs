// ============================================================================
// File: packages/vmhost/src/config/builder.rs
// ----------------------------------------------------------------------------
// Fail-fast builder for VmConfig.
// ============================================================================

use std::path::PathBuf;

use super::descriptor::{DebugLevel, PayloadSource, VmConfig};
use super::errors::{ConfigResult, ValidationError};
use crate::platform::HostCapabilities;

/// Builder for [`VmConfig`]
///
/// Numeric fields and the debug level are accepted as raw integers so that
/// values arriving from untrusted callers go through the same checks as
/// typed ones.
#[derive(Debug, Clone)]
pub struct VmConfigBuilder {
    apk_path: Option<PathBuf>,
    payload_config_path: Option<String>,
    payload_binary_path: Option<String>,
    debug_level: i64,
    protected_vm: Option<bool>,
    memory_mib: i64,
    num_cpus: i64,
}

impl VmConfigBuilder {
    /// New builder with debug level NONE, one CPU and default memory
    pub fn new() -> Self {
        Self {
            apk_path: None,
            payload_config_path: None,
            payload_binary_path: None,
            debug_level: DebugLevel::None.into(),
            protected_vm: None,
            memory_mib: 0,
            num_cpus: 1,
        }
    }

    /// Set the absolute path of the package holding the payload
    pub fn with_apk_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.apk_path = Some(path.into());
        self
    }

    /// Use a payload config file inside the package
    pub fn with_payload_config_path<S: Into<String>>(mut self, path: S) -> Self {
        self.payload_config_path = Some(path.into());
        self
    }

    /// Use a payload executable inside the package
    pub fn with_payload_binary_path<S: Into<String>>(mut self, path: S) -> Self {
        self.payload_binary_path = Some(path.into());
        self
    }

    /// Set the debug level (a [`DebugLevel`] or its wire integer)
    pub fn with_debug_level<L: Into<i64>>(mut self, level: L) -> Self {
        self.debug_level = level.into();
        self
    }

    /// Choose whether guest memory is isolated from the host
    pub fn with_protected_vm(mut self, protected_vm: bool) -> Self {
        self.protected_vm = Some(protected_vm);
        self
    }

    /// Set guest memory in MiB; 0 selects the platform default
    pub fn with_memory_mib(mut self, mib: i64) -> Self {
        self.memory_mib = mib;
        self
    }

    /// Set the number of guest vCPUs
    pub fn with_num_cpus(mut self, cpus: i64) -> Self {
        self.num_cpus = cpus;
        self
    }

    /// Validate against the local host and build
    pub fn build(self) -> ConfigResult<VmConfig> {
        self.build_for(HostCapabilities::get())
    }

    /// Validate against an explicit capability set and build
    pub fn build_for(self, caps: &HostCapabilities) -> ConfigResult<VmConfig> {
        let config = self.assemble(Some(caps))?;
        config.check_host(caps)?;
        Ok(config)
    }

    /// Check the invariants and assemble the descriptor
    ///
    /// Checks run in a fixed order and the first failure is reported:
    /// payload source, APK path, CPU count, memory, debug level, protection
    /// mode. The CPU upper bound is only checked when `caps` is given; host
    /// support for the protection mode is left to [`VmConfig::check_host`].
    pub(crate) fn assemble(self, caps: Option<&HostCapabilities>) -> ConfigResult<VmConfig> {
        let payload = match (self.payload_config_path, self.payload_binary_path) {
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingPayloadSource),
            (Some(config), None) => PayloadSource::ConfigFile(config),
            (None, Some(binary)) => PayloadSource::Binary(binary),
            (None, None) => return Err(ValidationError::MissingPayloadSource),
        };

        let apk_path = self.apk_path.ok_or(ValidationError::MissingApkPath)?;
        if !apk_path.is_absolute() {
            return Err(ValidationError::RelativeApkPath { path: apk_path });
        }
        // The persisted form stores the path as a JSON string.
        if apk_path.to_str().is_none() {
            return Err(ValidationError::NonUtf8ApkPath { path: apk_path });
        }

        let available = caps.map(|caps| caps.cpu_count);
        let num_cpus = u32::try_from(self.num_cpus)
            .ok()
            .filter(|cpus| *cpus >= 1 && available.is_none_or(|max| *cpus <= max))
            .ok_or(ValidationError::CpuCountOutOfRange {
                requested: self.num_cpus,
                available,
            })?;

        let memory_mib = u64::try_from(self.memory_mib).map_err(|_| {
            ValidationError::NegativeMemory {
                mib: self.memory_mib,
            }
        })?;

        let debug_level = DebugLevel::try_from(self.debug_level)?;
        let protected_vm = self.protected_vm.ok_or(ValidationError::ProtectedModeUnset)?;

        Ok(VmConfig {
            apk_path,
            payload,
            debug_level,
            protected_vm,
            memory_mib,
            num_cpus,
        })
    }
}

impl Default for VmConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
