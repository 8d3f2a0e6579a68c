//! # lspvisor
//!
//! **lspvisor** supervises a language server from the client side: it finds
//! the server executable, launches it over stdio, keeps exactly one session
//! alive, and restarts it when the session dies or its configuration changes.
//!
//! The server itself is opaque: messages are relayed unchanged. The crate
//! only interprets whether the channel is open, closed or faulted.
//!
//! ## Architecture
//! ```text
//!        Settings + Environment
//!                 │
//!                 ▼
//!        ┌─────────────────┐  Executable  ┌──────────────────────────────────┐
//!        │     locator     ├─────────────►│ Connection                       │
//!        └─────────────────┘              │  Stopped → Starting → Running    │
//!                 ▲                       │  generation += 1 on every start  │
//!                 │ re-resolve            │  Launcher ─► Session (stdio)     │
//!                 │                       └───────────────┬──────────────────┘
//!                 │                                       │ publish(Event{generation, kind})
//!                 │                                       ▼
//!                 │                       ┌──────────────────────────────────┐
//!                 │                       │       Bus (broadcast channel)    │
//!                 │                       └───────────────┬──────────────────┘
//!                 │                                       ▼
//! ┌───────────────┴────────┐              ┌──────────────────────────────────┐
//! │  RestartCoordinator    │◄─ restart ───┤ Supervisor listener              │
//! │  - one restart at once │              │  - drops stale generations       │
//! │  - one debounce timer  │              │  - Host status / alerts          │
//! └───────────────▲────────┘              │  - EscalationPolicy              │
//!                 │                       │  - SubscriberSet fan-out         │
//!   restart() ────┤                       └──────────────────────────────────┘
//!   settings_changed() ──┘
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Activation, restart command, settings changes, teardown.  | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Connection**    | Three-state lifecycle with generations.                   | [`Connection`], [`ConnectionState`]         |
//! | **Process seam**  | Pluggable launch/teardown of the server.                  | [`Launcher`], [`Session`], [`StdioLauncher`]|
//! | **Locator**       | Settings → env var → build outputs → `PATH`.              | [`resolve`], [`Executable`]                 |
//! | **Policies**      | Fault counting with a one-time alert; restart on closure. | [`EscalationPolicy`]                        |
//! | **Restarts**      | Coalescing and debouncing.                                | [`RestartCoordinator`], [`Trigger`]         |
//! | **Subscribers**   | Observe connection events.                                | [`Subscribe`], [`LogWriter`]                |
//! | **Host**          | Status indicator, alerts, progress.                       | [`Host`], [`LogHost`]                       |
//! | **Errors**        | Typed errors with stable labels.                          | [`ConnectionError`], [`SupervisorError`]    |
//!
//! ## Optional features
//! - `cli` (default): builds the `lspvisor` binary (`clap`, `tracing-subscriber`, `anyhow`).
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use lspvisor::{Config, LogWriter, Settings, SupervisorBuilder};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_json(r#"{ "serverPath": "/opt/l-lsp/bin/l-lsp" }"#)?;
//!
//!     let sup = SupervisorBuilder::new(Config::default())
//!         .with_settings(settings)
//!         .with_subscribers(vec![Arc::new(LogWriter)])
//!         .build();
//!
//!     sup.activate().await?;
//!     // ... host runs; restart with `sup.restart().await?`
//!     sup.deactivate().await;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod error;
mod events;
mod host;
mod locator;
mod policies;
mod restart;
mod settings;
mod subscribers;
mod supervisor;

pub mod shutdown;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use config::{Config, LocatorConfig};
pub use connection::{
    Connection, ConnectionState, FrameError, InitOptions, Launched, Launcher, Session,
    SessionSignal, Snapshot, StdioLauncher, read_frame, write_frame,
};
pub use error::{ConnectionError, RestartError, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use host::{Host, LogHost, Status};
pub use locator::{Environment, Executable, ExecutableSource, normalize, resolve};
pub use policies::{CloseAction, EscalationPolicy, FaultAction, FaultDecision};
pub use restart::{RestartCoordinator, RestartOutcome, RestartTarget, Trigger};
pub use settings::{Settings, SettingsChange, SettingsKey, TraceLevel, TraceSettings};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use supervisor::{RESTART_COMMAND, Supervisor, SupervisorBuilder};
