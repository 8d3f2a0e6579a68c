//! Error types used by the supervisor, the connection and the restart coordinator.
//!
//! This module defines the error enums for the layers of the crate:
//!
//! - [`ConnectionError`] failures launching, handshaking with or tearing down the server process.
//! - [`RestartError`] a restart sequence that did not end in `Running`.
//! - [`SupervisorError`] misuse of the supervisor lifecycle entry points, or a failed requested restart.
//!
//! Every enum provides `as_label` (stable snake_case label for logs).
//! Frame-level errors live next to the codec in [`crate::connection::FrameError`].

use thiserror::Error;

use crate::connection::ConnectionState;

/// # Errors produced by the process connection.
///
/// Launch faults (`Spawn`, `Handshake`) are reported once as a failed start.
/// `Teardown` is only ever logged by callers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The server process could not be spawned (command not found, permission denied, ...).
    #[error("failed to spawn `{command}`: {error}")]
    Spawn {
        /// Command as it was passed to the OS.
        command: String,
        /// The underlying error message.
        error: String,
    },

    /// The process started but the protocol session never became usable.
    #[error("handshake failed: {error}")]
    Handshake {
        /// The underlying error message.
        error: String,
    },

    /// Orderly teardown did not complete cleanly.
    #[error("teardown failed: {error}")]
    Teardown {
        /// The underlying error message.
        error: String,
    },

    /// An operation needed a running session.
    #[error("connection is not running")]
    NotRunning,

    /// `start()` was called while a session was already starting or running.
    #[error("connection is already {state}")]
    AlreadyActive {
        /// State observed when the start was refused.
        state: ConnectionState,
    },

    /// The connection was disposed; it can no longer be started.
    #[error("connection disposed")]
    Disposed,
}

impl ConnectionError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use lspvisor::ConnectionError;
    ///
    /// let err = ConnectionError::Handshake { error: "eof".into() };
    /// assert_eq!(err.as_label(), "connection_handshake");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionError::Spawn { .. } => "connection_spawn",
            ConnectionError::Handshake { .. } => "connection_handshake",
            ConnectionError::Teardown { .. } => "connection_teardown",
            ConnectionError::NotRunning => "connection_not_running",
            ConnectionError::AlreadyActive { .. } => "connection_already_active",
            ConnectionError::Disposed => "connection_disposed",
        }
    }

    /// True for faults of the launch kind (the process never reached `Running`).
    pub fn is_launch_fault(&self) -> bool {
        matches!(
            self,
            ConnectionError::Spawn { .. } | ConnectionError::Handshake { .. }
        )
    }
}

/// # Errors produced by a restart sequence.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestartError {
    /// The re-resolved server failed to reach `Running`.
    #[error("server failed to restart: {0}")]
    Start(#[from] ConnectionError),

    /// Teardown of the supervisor began before or during the restart.
    #[error("supervisor is shutting down")]
    Disposed,
}

impl RestartError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RestartError::Start(_) => "restart_start_failed",
            RestartError::Disposed => "restart_disposed",
        }
    }
}

/// # Errors produced by the supervisor lifecycle entry points.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// `activate()` was called twice.
    #[error("supervisor already activated")]
    AlreadyActivated,

    /// The entry point needs an activated supervisor.
    #[error("supervisor not activated")]
    NotActivated,

    /// The supervisor was deactivated and cannot be used again.
    #[error("supervisor deactivated")]
    Deactivated,

    /// The host invoked a command this supervisor does not provide.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    /// A requested restart ran and failed. The user was already alerted.
    #[error(transparent)]
    Restart(#[from] RestartError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::AlreadyActivated => "supervisor_already_activated",
            SupervisorError::NotActivated => "supervisor_not_activated",
            SupervisorError::Deactivated => "supervisor_deactivated",
            SupervisorError::UnknownCommand(_) => "supervisor_unknown_command",
            SupervisorError::Restart(e) => e.as_label(),
        }
    }
}
