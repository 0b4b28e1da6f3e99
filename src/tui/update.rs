//! Pure update function for the Elm-style dashboard.
//!
//! `update()` takes the current model and a message, mutates the model, and
//! returns a command describing any side-effects the runtime should execute.
//!
//! **Design invariant:** this module performs zero I/O. All effects are
//! described as [`DashboardCmd`] values.

use crate::telemetry::source::TelemetryEvent;
use crate::tui::model::{ConnectionStatus, DashboardCmd, DashboardModel, DashboardMsg};
use crate::tui::widgets::WidgetToolkit;

/// Apply a message to the model and return the next command for the runtime.
///
/// Messages must be applied one at a time in arrival order; the completion
/// detector depends on it.
pub fn update<W: WidgetToolkit>(model: &mut DashboardModel<W>, msg: DashboardMsg) -> DashboardCmd {
    match msg {
        DashboardMsg::Telemetry(event) => {
            model.events += 1;
            apply_telemetry(model, event)
        }

        DashboardMsg::Resize { cols, rows } => {
            model.terminal_size = (cols, rows);
            model.controller.rerender(&mut model.widgets);
            DashboardCmd::None
        }

        DashboardMsg::Quit => DashboardCmd::Quit,
    }
}

fn apply_telemetry<W: WidgetToolkit>(model: &mut DashboardModel<W>, event: TelemetryEvent) -> DashboardCmd {
    match event {
        TelemetryEvent::Snapshot(snapshot) => {
            match model.controller.on_snapshot(&snapshot, &mut model.widgets) {
                Some(notification) => {
                    model.notifications += 1;
                    DashboardCmd::Notify(notification)
                }
                None => DashboardCmd::None,
            }
        }

        // May arrive more than once; re-rendering is idempotent.
        TelemetryEvent::Ready => {
            model.set_connection(ConnectionStatus::Live);
            model.controller.rerender(&mut model.widgets);
            DashboardCmd::None
        }

        TelemetryEvent::Closed { error: None } => {
            model.set_connection(ConnectionStatus::Ended);
            DashboardCmd::None
        }

        TelemetryEvent::Closed { error: Some(details) } => {
            model.set_connection(ConnectionStatus::Failed(details.clone()));
            DashboardCmd::Fail(details)
        }
    }
}

// ──────────────────── tests ────────────────────
