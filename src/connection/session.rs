//! # Process boundary.
//!
//! The connection never touches a process directly. It asks a [`Launcher`] for a
//! [`Launched`] session: a [`Session`] handle (outbound messages + teardown) and
//! the receiving end of the session's [`SessionSignal`] stream.
//!
//! ```text
//! Launcher::launch(exe, init) ──► spawn + handshake ──► Launched {
//!                                                          session: Box<dyn Session>,   owned by Connection
//!                                                          signals: Receiver<Signal>,   owned by the pump
//!                                                       }
//! ```
//!
//! `launch` returns only after the handshake completed (`Ok`) or failed (`Err`).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ConnectionError;
use crate::locator::Executable;

/// Options forwarded to the server during the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitOptions {
    /// `clientInfo.name`.
    pub client_name: String,
    /// `initializationOptions.maxNumberOfProblems`.
    pub max_number_of_problems: u32,
    /// Workspace root sent as `rootUri`, if any.
    pub root_uri: Option<String>,
}

/// What a live session reports to its owner.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionSignal {
    /// A server message that is not a response to one of the session's own requests.
    Message(Value),
    /// A malformed message; the channel is still usable.
    Fault(String),
    /// The channel is gone (EOF, IO failure, process exit).
    Closed(String),
}

/// A spawned, initialized session.
pub struct Launched {
    pub session: Box<dyn Session>,
    pub signals: mpsc::UnboundedReceiver<SessionSignal>,
}

/// Spawns a server process and runs the handshake.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Launches `exe` and returns once the session is usable.
    async fn launch(&self, exe: &Executable, init: &InitOptions)
    -> Result<Launched, ConnectionError>;
}

/// Handle to one live session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Queues an outbound message, unchanged.
    fn send(&self, message: Value) -> Result<(), ConnectionError>;

    /// Orderly teardown: close notification, bounded wait, then forced termination.
    ///
    /// `grace` bounds each waiting step.
    async fn shutdown(self: Box<Self>, grace: Duration) -> Result<(), ConnectionError>;
}
