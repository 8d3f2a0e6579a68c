//! # Event bus for connection events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The connection
//! publishes into it from `start`/`stop` and from its session pump; the
//! supervisor listener is the main receiver.
//!
//! ```text
//! Connection::start/stop ──┐
//!                          ├──► Bus ───► supervisor listener ──► Host / Policy / SubscriberSet
//! session pump (gen N) ────┘        └──► any other Connection::subscribe() receiver
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits.
//! - **No persistence**: a receiver only sees events sent after it subscribed,
//!   so subscribe **before** calling `start()`.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for connection events.
///
/// Cheap to clone (an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver for subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
