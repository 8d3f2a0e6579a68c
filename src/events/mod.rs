//! Connection events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to everything the [`Connection`](crate::Connection)
//! reports about its session.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and metadata (generation, reason)
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Connection::start`/`stop` (state transitions) and the
//!   per-generation session pump (faults, unexpected closure).
//! - **Consumers**: the supervisor listener (status, policy, restart) which
//!   also fans out to the [`SubscriberSet`](crate::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
