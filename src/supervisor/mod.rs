//! # Supervisor: owns the connection and reacts to it.
//!
//! One [`Supervisor`] per host integration. It creates the
//! [`Connection`](crate::Connection) at build time and keeps it for its whole
//! life; starts and restarts re-arm it with a new generation.
//!
//! ## Architecture
//! ```text
//! activate() ─► listener task ◄── Bus ◄── Connection (transitions, faults, closure)
//!     │              │
//!     │              ├─ generation != current ─► drop
//!     │              ├─ SubscriberSet::emit
//!     │              ├─ Starting/Running/Stopped ─► Host::set_status   (Running ─► policy reset)
//!     │              ├─ ProtocolFault ─► policy.on_fault ─► alert once at threshold
//!     │              └─ SessionClosed ─► policy.on_closed ─► restart(AutoAfterClosure)
//!     │
//!     └─► resolve ─► Connection::start (progress; launch fault ─► one alert, no retry)
//!
//! restart() / execute_command(RESTART_COMMAND) ─► RestartCoordinator (Command)
//! settings_changed(s) ─► trace applied now; restart keys ─► RestartCoordinator (ConfigChange)
//!
//! RestartTarget::restart (one at a time):
//!   Running ─► stop │ Starting ─► wait until settled, stop if Running │ Stopped ─► -
//!   ─► re-resolve ─► start ─► Ok(generation) | alert once, stay Stopped
//!
//! deactivate(): disposing.cancel ─► cancel timer ─► dispose + stop connection
//!               ─► listener exits ─► subscribers drained
//! ```
//!
//! ## Example
//! ```no_run
//! use lspvisor::{Config, LogWriter, RESTART_COMMAND, SupervisorBuilder};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), lspvisor::SupervisorError> {
//! let sup = SupervisorBuilder::new(Config::default())
//!     .with_subscribers(vec![Arc::new(LogWriter)])
//!     .build();
//!
//! sup.activate().await?;
//! sup.execute_command(RESTART_COMMAND).await?;
//! sup.deactivate().await;
//! # Ok(())
//! # }
//! ```

mod builder;
mod context;
mod lifecycle;
mod listener;


pub use builder::SupervisorBuilder;
pub use lifecycle::{RESTART_COMMAND, Supervisor};
