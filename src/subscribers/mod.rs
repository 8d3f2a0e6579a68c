//! # Connection event subscribers.
//!
//! [`Subscribe`] is the extension point for observing connection events
//! outside the supervisor: logging, metrics, test probes. The supervisor
//! listener forwards every current-generation [`Event`](crate::Event) to a
//! [`SubscriberSet`], which fans it out without waiting on anyone.
//!
//! ```text
//! Connection ── publish ──► Bus ──► supervisor listener ──┬─► Host / policy / restarts
//!                                                         └─► SubscriberSet::emit
//!                                                                ├─► [queue] ─► LogWriter
//!                                                                └─► [queue] ─► custom
//! ```
//!
//! ## Implementing a subscriber
//! ```no_run
//! use async_trait::async_trait;
//! use lspvisor::{Event, EventKind, Subscribe};
//!
//! struct CrashCounter;
//!
//! #[async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::SessionClosed {
//!             // count it
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "crash-counter"
//!     }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use self::log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
