//! # Host surface.
//!
//! The supervisor only writes to the host: a status indicator, short alerts
//! and a blocking progress indicator around starts and restarts. Log lines go
//! through `tracing`.
//!
//! [`LogHost`] renders all of it as log lines and is what the CLI uses.

use crate::connection::ConnectionState;

/// Status indicator shown by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Spinner.
    Starting,
    /// Success glyph.
    Running,
    /// Error glyph, rendered distinctly.
    Stopped,
}

impl Status {
    pub fn icon(self) -> &'static str {
        match self {
            Status::Starting => "$(sync~spin)",
            Status::Running => "$(check)",
            Status::Stopped => "$(error)",
        }
    }

    /// Whether the host should use its error treatment.
    pub fn is_error(self) -> bool {
        matches!(self, Status::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Stopped => "stopped",
        }
    }
}

impl From<ConnectionState> for Status {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Starting => Status::Starting,
            ConnectionState::Running => Status::Running,
            ConnectionState::Stopped => Status::Stopped,
        }
    }
}

/// UI primitives the supervisor drives.
///
/// Called from the supervisor's tasks; implementations must not block.
pub trait Host: Send + Sync + 'static {
    /// Updates the status indicator. Called on every state transition.
    fn set_status(&self, status: Status);

    /// Shows a short user-visible notification.
    fn show_alert(&self, message: &str);

    /// Shows a blocking progress indicator with `title`.
    fn begin_progress(&self, title: &str);

    /// Hides the progress indicator.
    fn end_progress(&self);
}

/// Host that only writes log lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogHost;

impl Host for LogHost {
    fn set_status(&self, status: Status) {
        if status.is_error() {
            tracing::warn!(target: "lspvisor::host", status = status.as_str(), icon = status.icon(), "status");
        } else {
            tracing::info!(target: "lspvisor::host", status = status.as_str(), icon = status.icon(), "status");
        }
    }

    fn show_alert(&self, message: &str) {
        tracing::error!(target: "lspvisor::host", "{message}");
    }

    fn begin_progress(&self, title: &str) {
        tracing::info!(target: "lspvisor::host", "{title}...");
    }

    fn end_progress(&self) {
        tracing::debug!(target: "lspvisor::host", "progress done");
    }
}

/// Ends the progress indicator when dropped.
pub(crate) struct Progress<'a>(&'a dyn Host);

impl<'a> Progress<'a> {
    pub(crate) fn begin(host: &'a dyn Host, title: &str) -> Self {
        host.begin_progress(title);
        Self(host)
    }
}

impl Drop for Progress<'_> {
    fn drop(&mut self) {
        self.0.end_progress();
    }
}
