//! # Supervisor runtime configuration.
//!
//! Provides [`Config`], the fixed knobs of the supervisor runtime, and
//! [`LocatorConfig`], the names the [`locator`](crate::locator) searches for.
//!
//! These are *not* user settings: user-facing options the host edits at runtime
//! live in [`Settings`](crate::Settings). A `Config` is handed to the
//! [`SupervisorBuilder`](crate::SupervisorBuilder) once and never changes.
//!
//! ## Sentinel values
//! - `grace = 0s` → no graceful wait, the process is killed right after `exit`
//! - `locator.log_level = None` → the diagnostic-verbosity variable is inherited untouched

use std::time::Duration;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `debounce`: quiet period after the last settings change before restarting
/// - `alert_threshold`: consecutive protocol faults before the one-time alert
/// - `grace`: bound on each teardown step (shutdown acknowledgement, process exit)
/// - `bus_capacity`: connection event ring buffer size (min 1; clamped by Bus)
/// - `client_name`: reported to the server in `clientInfo`
#[derive(Clone, Debug)]
pub struct Config {
    /// Debounce window applied to configuration-change restarts.
    pub debounce: Duration,

    /// Number of consecutive faults that raises the one-time alert.
    ///
    /// Clamped to a minimum of 1.
    pub alert_threshold: u32,

    /// Maximum time to wait for the server to acknowledge `shutdown` and,
    /// separately, to exit after `exit`. After that the process is killed.
    pub grace: Duration,

    /// Capacity of the connection event broadcast channel.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Name sent in the `initialize` request.
    pub client_name: String,

    /// Where and how to look for the server executable.
    pub locator: LocatorConfig,
}

impl Config {
    /// Returns the alert threshold clamped to a minimum of 1.
    #[inline]
    pub fn alert_threshold_clamped(&self) -> u32 {
        self.alert_threshold.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `debounce = 1s`
    /// - `alert_threshold = 5`
    /// - `grace = 5s`
    /// - `bus_capacity = 1024`
    /// - `client_name = "lspvisor"`
    /// - `locator = LocatorConfig::default()`
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            alert_threshold: 5,
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            client_name: "lspvisor".to_string(),
            locator: LocatorConfig::default(),
        }
    }
}

/// Names used by the executable locator.
#[derive(Clone, Debug)]
pub struct LocatorConfig {
    /// Bare server binary name, without platform suffix.
    pub binary_name: String,

    /// Environment variable that overrides the server path.
    pub path_env: String,

    /// Diagnostic-verbosity variable passed to the server process.
    pub log_env: String,

    /// Value forced for `log_env`; `None` inherits the host's value.
    pub log_level: Option<String>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            binary_name: "l-lsp".to_string(),
            path_env: "L_LSP_SERVER_PATH".to_string(),
            log_env: "RUST_LOG".to_string(),
            log_level: None,
        }
    }
}
