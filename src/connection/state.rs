use std::fmt;

/// Lifecycle state of the connection.
///
/// ```text
///            start()            handshake ok
/// Stopped ───────────► Starting ───────────► Running
///    ▲                    │                     │
///    └────────────────────┴─────────────────────┘
///      stop() / handshake failure / unexpected exit
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, and terminal state of every generation.
    #[default]
    Stopped,
    /// Process spawned (or spawning), handshake in flight.
    Starting,
    /// Protocol session established.
    Running,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Stopped => "stopped",
            ConnectionState::Starting => "starting",
            ConnectionState::Running => "running",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State together with the generation it belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub state: ConnectionState,
    /// Incremented on every `start()`; 0 before the first one.
    pub generation: u64,
}
