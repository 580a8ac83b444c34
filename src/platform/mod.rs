// ============================================================================
// File: packages/vmhost/src/platform/mod.rs
// ----------------------------------------------------------------------------
// Host capability detection for VM sessions.
//
// Answers the questions a VM descriptor must be checked against:
// - Can this host run virtual machines at all?
// - Can it run protected VMs (guest memory isolated from the host)?
// - How many CPUs may a guest be given?
// ============================================================================

mod capabilities;

pub use capabilities::HostCapabilities;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_reports_at_least_one_cpu() {
        let caps = HostCapabilities::detect();
        assert!(caps.cpu_count >= 1);
    }

    #[test]
    fn cached_detection_is_stable() {
        let first = HostCapabilities::get();
        let second = HostCapabilities::get();
        assert_eq!(first, second);
    }

    #[test]
    fn protected_support_implies_vm_support() {
        let caps = HostCapabilities::detect();
        if caps.protected_vm_supported {
            assert!(caps.vm_supported);
        }
    }
}
