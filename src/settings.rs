//! # Host settings consumed by the supervisor.
//!
//! The host owns the settings UI and schema; it hands the supervisor the
//! already-parsed JSON section. [`Settings`] deserializes it with defaults for
//! every missing key, and [`Settings::diff`] tells the supervisor whether a
//! change needs a server restart.
//!
//! ## Keys
//! ```text
//! serverPath            string   ""     explicit server executable
//! maxNumberOfProblems   integer  100    forwarded in initializationOptions
//! trace.server          enum     off    host-side logging only, never restarts
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host-side protocol trace verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    /// Relayed messages are not logged.
    #[default]
    Off,
    /// Relayed messages are logged by method name.
    Messages,
    /// Relayed messages are logged with their full payload.
    Verbose,
}

impl TraceLevel {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            TraceLevel::Off => 0,
            TraceLevel::Messages => 1,
            TraceLevel::Verbose => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => TraceLevel::Off,
            1 => TraceLevel::Messages,
            _ => TraceLevel::Verbose,
        }
    }
}

/// `trace` settings group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Verbosity of the relayed-message log.
    pub server: TraceLevel,
}

/// User settings for the language server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Explicit path to the server executable; blank means "search".
    pub server_path: String,

    /// Upper bound on problems the server reports per file.
    pub max_number_of_problems: u32,

    /// Host-side tracing.
    pub trace: TraceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_path: String::new(),
            max_number_of_problems: 100,
            trace: TraceSettings::default(),
        }
    }
}

/// A settings key the supervisor reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsKey {
    ServerPath,
    MaxNumberOfProblems,
    TraceServer,
}

impl SettingsKey {
    /// Whether a change of this key requires restarting the server.
    #[inline]
    pub fn requires_restart(self) -> bool {
        !matches!(self, SettingsKey::TraceServer)
    }

    /// JSON path of the key inside the settings section.
    pub fn as_str(self) -> &'static str {
        match self {
            SettingsKey::ServerPath => "serverPath",
            SettingsKey::MaxNumberOfProblems => "maxNumberOfProblems",
            SettingsKey::TraceServer => "trace.server",
        }
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys that differ between two settings snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsChange {
    keys: Vec<SettingsKey>,
}

impl SettingsChange {
    /// Changed keys, in declaration order.
    pub fn keys(&self) -> &[SettingsKey] {
        &self.keys
    }

    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True if at least one changed key requires a restart.
    pub fn requires_restart(&self) -> bool {
        self.keys.iter().any(|k| k.requires_restart())
    }

    /// True if `key` changed.
    pub fn affects(&self, key: SettingsKey) -> bool {
        self.keys.contains(&key)
    }
}

impl Settings {
    /// Parses a settings section; missing keys take their defaults.
    ///
    /// `null` is accepted and yields the defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }

    /// Parses a settings section from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Explicit server path with surrounding whitespace removed, if any.
    pub fn server_path_trimmed(&self) -> Option<&str> {
        let p = self.server_path.trim();
        (!p.is_empty()).then_some(p)
    }

    /// Lists keys whose value differs in `next`.
    pub fn diff(&self, next: &Settings) -> SettingsChange {
        let mut keys = Vec::new();
        if self.server_path_trimmed() != next.server_path_trimmed() {
            keys.push(SettingsKey::ServerPath);
        }
        if self.max_number_of_problems != next.max_number_of_problems {
            keys.push(SettingsKey::MaxNumberOfProblems);
        }
        if self.trace.server != next.trace.server {
            keys.push(SettingsKey::TraceServer);
        }
        SettingsChange { keys }
    }
}
