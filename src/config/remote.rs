// ============================================================================
// File: packages/vmhost/src/config/remote.rs
// ----------------------------------------------------------------------------
// Projection of VmConfig into the VM service's creation request.
//
// The service receives an already-opened package handle, never a path, so
// it can only reach files the caller itself was able to open.
// ============================================================================

use std::fs::File;

use super::descriptor::{DebugLevel, PayloadSource, VmConfig};
use super::errors::{ConfigResult, ValidationError};

/// Payload selection as understood by the VM service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemotePayload {
    /// Path of a payload config file inside the package
    ConfigPath(String),
    /// Path of a payload executable inside the package
    Binary { payload_path: String },
}

/// Creation request handed to the VM service
#[derive(Debug)]
pub struct RemoteConfig {
    /// Package opened read-only by the caller
    pub apk: File,

    pub payload: RemotePayload,

    pub debug_level: DebugLevel,

    pub protected_vm: bool,

    /// 0 selects the platform default
    pub memory_mib: u64,

    pub num_cpus: u32,

    /// Always empty; callers cannot inject task profiles
    pub task_profiles: Vec<String>,
}

impl VmConfig {
    /// Open the package and build the service creation request
    pub fn to_remote_config(&self) -> ConfigResult<RemoteConfig> {
        let apk = File::open(&self.apk_path).map_err(|e| ValidationError::ApkUnreadable {
            path: self.apk_path.clone(),
            details: e.to_string(),
        })?;

        let payload = match &self.payload {
            PayloadSource::ConfigFile(path) => RemotePayload::ConfigPath(path.clone()),
            PayloadSource::Binary(path) => RemotePayload::Binary {
                payload_path: path.clone(),
            },
        };

        Ok(RemoteConfig {
            apk,
            payload,
            debug_level: self.debug_level,
            protected_vm: self.protected_vm,
            memory_mib: self.memory_mib,
            num_cpus: self.num_cpus,
            task_profiles: Vec::new(),
        })
    }
}
