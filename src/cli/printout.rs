//! Plain-text status printer: one block per snapshot on stdout, for
//! terminals where the full-screen dashboard is unwanted (logging to a file,
//! piping through `tee`, serial consoles).

#![allow(missing_docs)]

use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use crossbeam_channel::{RecvTimeoutError, bounded};

use crate::core::config::DashboardConfig;
use crate::core::errors::{BpError, Result};
use crate::core::signals::SignalHandler;
use crate::notify::NotificationManager;
use crate::telemetry::snapshot::StatusSnapshot;
use crate::telemetry::source::{SourceSpec, Subscription, TelemetryEvent};
use crate::tui::controller::DashboardController;
use crate::tui::presentation::gcode_label;
use crate::tui::widgets::{WidgetId, WidgetToolkit};

/// Print status blocks until the source ends, fails, or a signal arrives.
pub fn run_printout<O: Write>(
    source: SourceSpec,
    settings: &DashboardConfig,
    notifier: &mut NotificationManager,
    signals: &SignalHandler,
    out: &mut O,
) -> Result<()> {
    let (tx, rx) = bounded(settings.channel_capacity.max(1));
    let subscription = Subscription::open(source.build(), tx)?;
    let mut controller = DashboardController::new(settings.clone());
    let poll = Duration::from_millis(settings.poll_interval_ms.max(1));
    let stdout_err = |source| BpError::io("<stdout>", source);

    let result = loop {
        if signals.should_shutdown() {
            tracing::info!("shutdown signal received");
            break Ok(());
        }
        let event = match rx.recv_timeout(poll) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            // Sources always close with an event; a bare hangup means the reader died.
            Err(RecvTimeoutError::Disconnected) => {
                break Err(BpError::ChannelClosed {
                    component: "telemetry",
                });
            }
        };
        match event {
            TelemetryEvent::Snapshot(snapshot) => {
                write_block(out, &snapshot).map_err(stdout_err)?;
                if let Some(done) = controller.on_snapshot(&snapshot, &mut Discard) {
                    writeln!(out, "{}\n", done.message().green().bold()).map_err(stdout_err)?;
                    notifier.notify(&done);
                }
            }
            TelemetryEvent::Ready => tracing::debug!("printer state complete"),
            TelemetryEvent::Closed { error: None } => break Ok(()),
            TelemetryEvent::Closed {
                error: Some(details),
            } => break Err(BpError::SourceClosed { details }),
        }
    };

    drop(subscription);
    tracing::info!(snapshots = controller.processed(), "printout stopped");
    result
}

/// Write one status block. Snapshots before the full state only get the header.
pub fn write_block<O: Write>(out: &mut O, s: &StatusSnapshot) -> std::io::Result<()> {
    let header = format!("--- msg {} ---", s.sequence_id.as_deref().unwrap_or("-"));
    writeln!(out, "{}", header.bold())?;

    let Some(state) = s.job_state() else {
        writeln!(out, "{}\n", "(waiting for full printer state)".dimmed())?;
        return out.flush();
    };

    for line in block_lines(s, state) {
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;
    out.flush()
}

fn block_lines(s: &StatusSnapshot, state: &str) -> Vec<String> {
    let lights = if s.lights.is_empty() {
        "--".to_string()
    } else {
        s.lights
            .iter()
            .map(|l| format!("{} {}", l.node, l.mode))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let gcode = gcode_label(
        s.job_file_name.as_deref().unwrap_or_default(),
        s.task_name(),
        s.current_line_number.unwrap_or(0),
    );

    vec![
        format!(
            "Nozzle Temperature:  {:5.1} / {:5.1} °C",
            s.nozzle_temp.unwrap_or(0.0),
            s.nozzle_target_temp.unwrap_or(0.0)
        ),
        format!(
            "Hotbed Temperature:  {:5.1} / {:5.1} °C",
            s.bed_temp.unwrap_or(0.0),
            s.bed_target_temp.unwrap_or(0.0)
        ),
        format!(
            "Fans:   nozzle:{}, cooling:{}",
            s.nozzle_fan_speed.unwrap_or(0),
            s.cooling_fan_speed.unwrap_or(0)
        ),
        String::new(),
        format!(
            "Progress: {state} ({}) {}%, {} minutes remaining",
            s.job_type.as_deref().unwrap_or("-"),
            s.progress_percent.unwrap_or(0),
            s.remaining_minutes.unwrap_or(0)
        ),
        format!("GCODE:  {gcode}"),
        format!(
            "Layer:  {} / {}",
            s.current_layer.unwrap_or(0),
            s.total_layers.unwrap_or(0)
        ),
        String::new(),
        format!("WiFi: {}", s.wifi_signal.as_deref().unwrap_or("--")),
        format!("Lights: {lights}"),
    ]
}

/// The printout has no widgets; the controller still drives detection.
struct Discard;

impl WidgetToolkit for Discard {
    fn set_text(&mut self, _id: WidgetId, _text: &str) {}
    fn set_progress(&mut self, _id: WidgetId, _progress: f64, _total: Option<f64>) {}
}
