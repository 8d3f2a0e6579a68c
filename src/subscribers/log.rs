//! # Log channel subscriber.
//!
//! [`LogWriter`] turns connection events into log lines through `tracing`
//! (target `lspvisor::events`):
//!
//! ```text
//! INFO  [starting] generation=2
//! INFO  [running] generation=2
//! WARN  [stopped] generation=2 reason="server exited with code 1"
//! WARN  [protocol-fault] generation=2 reason="malformed message: ..."
//! WARN  [session-closed] generation=2 reason="server closed its output"
//! ```

use async_trait::async_trait;

use super::Subscribe;
use crate::events::{Event, EventKind};

/// Writes every event to the log channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let tag = e.kind.as_str();
        let reason = e.reason.as_deref();
        match e.kind {
            EventKind::Starting | EventKind::Running => {
                tracing::info!(target: "lspvisor::events", generation = e.generation, "[{tag}]");
            }
            EventKind::Stopped if reason.is_none() => {
                tracing::info!(target: "lspvisor::events", generation = e.generation, "[{tag}]");
            }
            EventKind::Stopped | EventKind::ProtocolFault | EventKind::SessionClosed => {
                tracing::warn!(
                    target: "lspvisor::events",
                    generation = e.generation,
                    reason = reason.unwrap_or(""),
                    "[{tag}]"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
