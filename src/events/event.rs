//! # Events emitted by the process connection.
//!
//! [`EventKind`] classifies events in two groups:
//! - **Transitions**: `Starting`, `Running`, `Stopped` (one per state change)
//! - **Session signals**: `ProtocolFault`, `SessionClosed`
//!
//! Every [`Event`] carries the connection **generation** it belongs to.
//! Consumers must drop events whose generation is not the connection's current
//! one: a slow teardown of generation N may still be delivering after
//! generation N+1 reached `Running`.
//!
//! ## Ordering guarantees
//! Per generation, transitions are published in the order
//! `Starting → {Running | Stopped}` and `Running → Stopped`; `SessionClosed`
//! always follows the `Stopped` it caused. `seq` is a global, monotonically
//! increasing number across all events.
//!
//! ## Example
//! ```rust
//! use lspvisor::{ConnectionState, Event, EventKind};
//!
//! let ev = Event::new(EventKind::Stopped, 3).with_reason("server exited");
//! assert_eq!(ev.state(), Some(ConnectionState::Stopped));
//! assert_eq!(ev.generation, 3);
//! assert_eq!(ev.reason.as_deref(), Some("server exited"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::connection::ConnectionState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of connection events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Transitions ===
    /// `Stopped → Starting`: a new generation was armed and is launching.
    Starting,

    /// `Starting → Running`: handshake completed.
    Running,

    /// `* → Stopped`: explicit stop, handshake failure or unexpected termination.
    ///
    /// Sets `reason` when the stop was not requested.
    Stopped,

    // === Session signals ===
    /// A malformed or unexpected message arrived on an otherwise open channel.
    ///
    /// Sets `reason`. The session stays up.
    ProtocolFault,

    /// The channel closed without a stop having been requested.
    ///
    /// Published right after the matching `Stopped`. Sets `reason`.
    SessionClosed,
}

impl EventKind {
    /// Short tag used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Starting => "starting",
            EventKind::Running => "running",
            EventKind::Stopped => "stopped",
            EventKind::ProtocolFault => "protocol-fault",
            EventKind::SessionClosed => "session-closed",
        }
    }
}

/// Connection event with optional reason.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Connection generation the event belongs to.
    pub generation: u64,
    /// Event classification.
    pub kind: EventKind,
    /// Human-readable reason (failure, fault or closure detail).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates an event with the current timestamp and the next sequence number.
    pub fn new(kind: EventKind, generation: u64) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            generation,
            kind,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// The state this event transitions into, if it is a transition.
    #[inline]
    pub fn state(&self) -> Option<ConnectionState> {
        match self.kind {
            EventKind::Starting => Some(ConnectionState::Starting),
            EventKind::Running => Some(ConnectionState::Running),
            EventKind::Stopped => Some(ConnectionState::Stopped),
            EventKind::ProtocolFault | EventKind::SessionClosed => None,
        }
    }

    /// Creates the transition event into `state`.
    #[inline]
    pub fn transition(state: ConnectionState, generation: u64) -> Self {
        let kind = match state {
            ConnectionState::Starting => EventKind::Starting,
            ConnectionState::Running => EventKind::Running,
            ConnectionState::Stopped => EventKind::Stopped,
        };
        Self::new(kind, generation)
    }
}
