//! Restart coordination.
//!
//! Every restart, whatever asked for it, goes through one
//! [`RestartCoordinator`]:
//!
//! ```text
//! Trigger::Command ──────────┐
//! Trigger::AutoAfterClosure ─┼─► in progress? ──yes──► Coalesced
//!                            │        └─no──► RestartTarget::restart(trigger)
//! Trigger::ConfigChange ─────┴─► (re)arm the single debounce timer ─► Scheduled
//!                                          └─ fires after the window ─► same guarded path
//! ```
//!
//! The coordinator owns only the concurrency rules. What a restart *does*
//! (stop, re-resolve, start) is the [`RestartTarget`]'s business.

mod coordinator;

pub use coordinator::RestartCoordinator;

use async_trait::async_trait;

use crate::error::RestartError;

/// Why a restart was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The host invoked the restart command.
    Command,
    /// A restart-relevant setting changed (debounced).
    ConfigChange,
    /// The session closed without a stop being requested.
    AutoAfterClosure,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Command => "command",
            Trigger::ConfigChange => "config-change",
            Trigger::AutoAfterClosure => "auto-after-closure",
        }
    }
}

/// Result of a restart request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The restart ran and the connection reached `Running` in `generation`.
    Restarted { generation: u64 },
    /// Another restart was in flight; this request was dropped.
    Coalesced,
    /// A debounced restart was armed (replacing any earlier one).
    Scheduled,
}

/// Something that can be restarted.
#[async_trait]
pub trait RestartTarget: Send + Sync + 'static {
    /// Runs one full restart sequence and returns the new generation.
    async fn restart(&self, trigger: Trigger) -> Result<u64, RestartError>;
}
