// ============================================================================
// File: packages/vmhost/src/config/persist.rs
// ----------------------------------------------------------------------------
// Versioned persisted form of VmConfig.
//
// The record is a flat JSON object. Version history:
// - 1: protectedVm, memoryMib and numCpus may be absent
// - 2: current layout
// ============================================================================

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use super::builder::VmConfigBuilder;
use super::descriptor::{DebugLevel, PayloadSource, VmConfig};
use super::errors::{FormatError, FormatResult, ValidationError};

/// Version written by this implementation
pub const CONFIG_VERSION: i64 = 2;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedConfig {
    #[serde(default)]
    version: Option<i64>,

    #[serde(default)]
    apk_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload_config_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload_binary_path: Option<String>,

    #[serde(default)]
    debug_level: Option<i64>,

    #[serde(default)]
    protected_vm: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    memory_mib: Option<i64>,

    #[serde(default)]
    num_cpus: Option<i64>,
}

impl VmConfig {
    /// Encode into the current persisted form
    pub fn serialize(&self) -> FormatResult<Vec<u8>> {
        let (payload_config_path, payload_binary_path) = match &self.payload {
            PayloadSource::ConfigFile(path) => (Some(path.clone()), None),
            PayloadSource::Binary(path) => (None, Some(path.clone())),
        };

        let apk_path = self.apk_path.to_str().ok_or_else(|| {
            ValidationError::NonUtf8ApkPath {
                path: self.apk_path.clone(),
            }
        })?;

        let record = PersistedConfig {
            version: Some(CONFIG_VERSION),
            apk_path: Some(apk_path.to_string()),
            payload_config_path,
            payload_binary_path,
            debug_level: Some(self.debug_level.into()),
            protected_vm: Some(self.protected_vm),
            memory_mib: i64::try_from(self.memory_mib).ok().filter(|mib| *mib > 0),
            num_cpus: Some(i64::from(self.num_cpus)),
        };

        serde_json::to_vec_pretty(&record).map_err(|e| FormatError::Malformed {
            details: format!("Failed to encode config record: {e}"),
        })
    }

    /// Decode a persisted record of any version up to [`CONFIG_VERSION`]
    pub fn deserialize(bytes: &[u8]) -> FormatResult<VmConfig> {
        let record: PersistedConfig =
            serde_json::from_slice(bytes).map_err(|e| FormatError::Malformed {
                details: e.to_string(),
            })?;

        let version = record
            .version
            .ok_or(FormatError::MissingField { field: "version" })?;
        if version > CONFIG_VERSION {
            return Err(FormatError::VersionTooNew {
                found: version,
                supported: CONFIG_VERSION,
            });
        }
        if version < 1 {
            return Err(FormatError::Malformed {
                details: format!("Unknown config version {version}"),
            });
        }

        let apk_path = record
            .apk_path
            .ok_or(FormatError::MissingField { field: "apkPath" })?;

        if record.payload_config_path.is_none() && record.payload_binary_path.is_none() {
            return Err(FormatError::MissingField {
                field: "payloadBinaryPath",
            });
        }

        let mut builder = VmConfigBuilder::new().with_apk_path(apk_path);
        if let Some(config) = record.payload_config_path {
            builder = builder.with_payload_config_path(config);
        }
        if let Some(binary) = record.payload_binary_path {
            builder = builder.with_payload_binary_path(binary);
        }

        let raw_debug_level = record
            .debug_level
            .ok_or(FormatError::MissingField { field: "debugLevel" })?;
        let debug_level =
            DebugLevel::try_from(raw_debug_level).map_err(|_| FormatError::InvalidEnum {
                field: "debugLevel",
                value: raw_debug_level,
            })?;

        let config = builder
            .with_debug_level(debug_level)
            .with_protected_vm(record.protected_vm.unwrap_or(false))
            .with_memory_mib(record.memory_mib.unwrap_or(0))
            .with_num_cpus(record.num_cpus.unwrap_or(1))
            .assemble(None)?;

        if version < CONFIG_VERSION {
            log::debug!("upgraded config record from version {version}");
        }

        Ok(config)
    }

    /// Write the persisted form to `output`
    pub fn write_to<W: Write>(&self, mut output: W) -> FormatResult<()> {
        let bytes = self.serialize()?;
        output
            .write_all(&bytes)
            .and_then(|_| output.flush())
            .map_err(|e| FormatError::Malformed {
                details: format!("Failed to write config record: {e}"),
            })
    }

    /// Read a persisted record from `input`
    pub fn read_from<R: Read>(mut input: R) -> FormatResult<VmConfig> {
        let mut bytes = Vec::new();
        input
            .read_to_end(&mut bytes)
            .map_err(|e| FormatError::Malformed {
                details: format!("Failed to read config record: {e}"),
            })?;
        Self::deserialize(&bytes)
    }
}
