//! Elm-style state model for the dashboard.
//!
//! All display state lives in [`DashboardModel`]. Telemetry and terminal
//! events arrive as [`DashboardMsg`] values; side-effects are represented as
//! [`DashboardCmd`] values returned from the update function.
//!
//! **Design invariant:** no I/O happens here. The widget tree is retained
//! state; painting it is the runtime's job.

#![allow(missing_docs)]

use crate::core::config::DashboardConfig;
use crate::notify::NotificationEvent;
use crate::telemetry::source::TelemetryEvent;
use crate::tui::controller::DashboardController;
use crate::tui::widgets::{WidgetId, WidgetToolkit};

// ──────────────────── connection ────────────────────

/// Lifecycle of the telemetry stream as seen by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Subscribed, waiting for the full printer state.
    Connecting,
    /// Full state received at least once.
    Live,
    /// The source ended normally (end of a replay).
    Ended,
    /// The source terminated abnormally.
    Failed(String),
}

impl ConnectionStatus {
    #[must_use]
    pub fn label(&self, source: &str) -> String {
        match self {
            Self::Connecting => format!("connecting to {source} ..."),
            Self::Live => format!("live: {source}"),
            Self::Ended => format!("stream ended: {source}"),
            Self::Failed(details) => format!("stream failed: {details}"),
        }
    }
}

// ──────────────────── model ────────────────────

/// Dashboard state, generic over the widget tree so tests can record writes.
pub struct DashboardModel<W: WidgetToolkit> {
    pub controller: DashboardController,
    pub widgets: W,
    pub connection: ConnectionStatus,
    /// Source description shown in the connection label.
    pub source: String,
    pub terminal_size: (u16, u16),
    /// Telemetry events handled, of any kind.
    pub events: u64,
    pub notifications: u64,
}

impl<W: WidgetToolkit> DashboardModel<W> {
    pub fn new(settings: DashboardConfig, widgets: W, source: impl Into<String>, size: (u16, u16)) -> Self {
        let mut model = Self {
            controller: DashboardController::new(settings),
            widgets,
            connection: ConnectionStatus::Connecting,
            source: source.into(),
            terminal_size: size,
            events: 0,
            notifications: 0,
        };
        model.refresh_connection_label();
        model
    }

    pub fn set_connection(&mut self, status: ConnectionStatus) {
        if self.connection != status {
            tracing::debug!(from = ?self.connection, to = ?status, "connection status changed");
            self.connection = status;
        }
        self.refresh_connection_label();
    }

    fn refresh_connection_label(&mut self) {
        let label = self.connection.label(&self.source);
        self.widgets.set_text(WidgetId::Connection, &label);
    }
}

// ──────────────────── messages ────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardMsg {
    /// One event from the telemetry channel, in arrival order.
    Telemetry(TelemetryEvent),
    Resize { cols: u16, rows: u16 },
    Quit,
}

// ──────────────────── commands ────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardCmd {
    /// No side-effect.
    None,
    /// Dispatch a completion notification (fire-and-forget).
    Notify(NotificationEvent),
    /// Terminate the display loop normally.
    Quit,
    /// Terminate the display loop with an error.
    Fail(String),
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Labels(Vec<(WidgetId, String)>);

    impl WidgetToolkit for Labels {
        fn set_text(&mut self, id: WidgetId, text: &str) {
            self.0.push((id, text.to_string()));
        }

        fn set_progress(&mut self, _id: WidgetId, _progress: f64, _total: Option<f64>) {}
    }

    #[test]
    fn new_model_shows_connecting_label() {
        let model = DashboardModel::new(DashboardConfig::default(), Labels::default(), "p1s:8883", (80, 24));
        assert_eq!(model.connection, ConnectionStatus::Connecting);
        assert_eq!(
            model.widgets.0,
            vec![(WidgetId::Connection, "connecting to p1s:8883 ...".to_string())]
        );
    }

    #[test]
    fn connection_labels() {
        assert_eq!(ConnectionStatus::Live.label("x"), "live: x");
        assert_eq!(ConnectionStatus::Ended.label("x"), "stream ended: x");
        assert_eq!(
            ConnectionStatus::Failed("exit 5".to_string()).label("x"),
            "stream failed: exit 5"
        );
    }
}
