// ============================================================================
// File: packages/vmhost/src/platform/capabilities.rs
// ----------------------------------------------------------------------------
// Virtualization capability probing for the local host.
// ============================================================================

use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Global host capability cache
static HOST_CAPABILITIES: OnceLock<HostCapabilities> = OnceLock::new();

/// What a host advertises about its ability to run guests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// Non-protected VMs can be created
    pub vm_supported: bool,

    /// Protected VMs can be created
    pub protected_vm_supported: bool,

    /// CPUs available to a single guest
    pub cpu_count: u32,
}

impl HostCapabilities {
    /// Explicit capability set
    pub fn new(vm_supported: bool, protected_vm_supported: bool, cpu_count: u32) -> Self {
        Self {
            vm_supported,
            protected_vm_supported,
            cpu_count: cpu_count.max(1),
        }
    }

    /// Get or detect the local host capabilities
    ///
    /// Uses cached detection results after the first call.
    pub fn get() -> &'static HostCapabilities {
        HOST_CAPABILITIES.get_or_init(Self::detect)
    }

    /// Force re-detection of the local host capabilities
    pub fn detect() -> HostCapabilities {
        let vm_supported = has_kvm_support();
        let protected_vm_supported = vm_supported && has_protected_kvm_mode();
        let cpu_count = u32::try_from(num_cpus::get()).unwrap_or(u32::MAX);

        log::debug!(
            "host capabilities: vm={} protected_vm={} cpus={}",
            vm_supported,
            protected_vm_supported,
            cpu_count
        );

        Self::new(vm_supported, protected_vm_supported, cpu_count)
    }

    /// Whether a VM with the given protection mode can be created here
    pub fn supports(&self, protected_vm: bool) -> bool {
        if protected_vm {
            self.protected_vm_supported
        } else {
            self.vm_supported
        }
    }
}

fn has_kvm_support() -> bool {
    Path::new("/dev/kvm").exists()
}

fn has_protected_kvm_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        if let Ok(cmdline) = std::fs::read_to_string("/proc/cmdline") {
            return cmdline
                .split_whitespace()
                .any(|arg| arg == "kvm-arm.mode=protected");
        }
    }
    false
}
