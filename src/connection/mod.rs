//! Connection to the language server process.
//!
//! - [`lifecycle`] the [`Connection`] lifecycle (Stopped → Starting → Running, generations)
//! - [`session`] the [`Launcher`]/[`Session`] seam between the connection and a process
//! - [`stdio`] the production launcher speaking JSON-RPC over stdio
//! - [`codec`] `Content-Length` framing
//! - [`state`] [`ConnectionState`] and [`Snapshot`]

pub mod codec;
mod lifecycle;
mod session;
mod state;
mod stdio;

pub use codec::{FrameError, read_frame, write_frame};
pub use lifecycle::Connection;
pub use session::{InitOptions, Launched, Launcher, Session, SessionSignal};
pub use state::{ConnectionState, Snapshot};
pub use stdio::StdioLauncher;
