// ============================================================================
// File: packages/vmhost/src/lifecycle/options.rs
// ----------------------------------------------------------------------------
// Operational settings for a lifecycle controller
// ============================================================================

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wait for the terminal notification after `stop`
pub const DEFAULT_STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Controller settings
///
/// None of these affect what VM is launched; they tune how the session is
/// driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerOptions {
    /// How long `stop` waits for the service to confirm termination
    pub stop_grace_period: Duration,

    /// Start the VM as part of `create`
    pub auto_start: bool,

    /// Name forwarded to the service for the host-side console
    pub console_name: Option<String>,
}

impl ControllerOptions {
    pub fn new() -> Self {
        Self {
            stop_grace_period: DEFAULT_STOP_GRACE_PERIOD,
            auto_start: false,
            console_name: None,
        }
    }

    /// Set the stop grace period
    pub fn with_stop_grace_period(mut self, period: Duration) -> Self {
        self.stop_grace_period = period;
        self
    }

    /// Set auto-start
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Set the host console name
    pub fn with_console_name<N: Into<String>>(mut self, name: N) -> Self {
        self.console_name = Some(name.into());
        self
    }

    /// Read options from string settings
    ///
    /// Recognised keys: `stop_grace_period_ms`, `auto_start`, `console_name`.
    /// Unparsable values keep the default and are logged.
    pub fn from_settings(settings: &HashMap<String, String>) -> Self {
        let mut options = Self::new();

        if let Some(value) = settings.get("stop_grace_period_ms") {
            match value.parse::<u64>() {
                Ok(ms) => options.stop_grace_period = Duration::from_millis(ms),
                Err(e) => log::warn!("ignoring stop_grace_period_ms={value}: {e}"),
            }
        }

        if let Some(value) = settings.get("auto_start") {
            match value.parse::<bool>() {
                Ok(auto_start) => options.auto_start = auto_start,
                Err(e) => log::warn!("ignoring auto_start={value}: {e}"),
            }
        }

        if let Some(name) = settings.get("console_name") {
            options.console_name = Some(name.clone());
        }

        options
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::new()
    }
}
