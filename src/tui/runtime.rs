//! Display loop: owns the terminal and the widget tree, drains telemetry in
//! arrival order, and executes the commands `update()` returns.
//!
//! The telemetry source delivers on its own thread into a bounded channel;
//! this loop is the only writer to the screen.

#![allow(missing_docs)]

use std::io;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::config::DashboardConfig;
use crate::core::errors::{BpError, Result};
use crate::core::signals::SignalHandler;
use crate::notify::NotificationManager;
use crate::telemetry::source::{SourceSpec, Subscription, TelemetryEvent};
use crate::tui::model::{DashboardCmd, DashboardModel, DashboardMsg};
use crate::tui::screen::Screen;
use crate::tui::terminal_guard::TerminalGuard;
use crate::tui::update::update;
use crate::tui::widgets::WidgetToolkit;

/// Upper bound on events applied between two redraws, so a burst of
/// telemetry cannot starve keyboard input.
const MAX_EVENTS_PER_FRAME: usize = 256;

/// Everything the dashboard needs besides the notification manager.
#[derive(Debug, Clone)]
pub struct DashboardRuntimeConfig {
    pub settings: DashboardConfig,
    pub source: SourceSpec,
}

/// What the loop should do after executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// Run the live dashboard until the user quits, a shutdown signal arrives,
/// or the source fails.
///
/// The subscription outlives the terminal guard, so the terminal is restored
/// before the source is released on every exit path.
pub fn run_dashboard(
    config: &DashboardRuntimeConfig,
    notifier: &mut NotificationManager,
    signals: &SignalHandler,
) -> Result<()> {
    let (tx, rx) = bounded(config.settings.channel_capacity.max(1));
    let title = config.source.title();
    let subscription = Subscription::open(config.source.clone().build(), tx)?;

    let guard = TerminalGuard::new().map_err(|source| BpError::Terminal { source })?;
    let size = TerminalGuard::terminal_size();
    let screen = Screen::new(title, config.settings.bar_width, size);
    let mut model = DashboardModel::new(config.settings.clone(), screen, subscription.describe(), size);

    let poll = Duration::from_millis(config.settings.poll_interval_ms.max(1));
    let result = run_loop(&mut model, &rx, notifier, signals, poll);

    drop(guard);
    drop(subscription);
    tracing::info!(
        events = model.events,
        notifications = model.notifications,
        "dashboard stopped"
    );
    result
}

fn run_loop(
    model: &mut DashboardModel<Screen>,
    rx: &Receiver<TelemetryEvent>,
    notifier: &mut NotificationManager,
    signals: &SignalHandler,
    poll: Duration,
) -> Result<()> {
    let mut stdout = io::stdout();
    let terminal = |source| BpError::Terminal { source };

    loop {
        if drain_events(model, rx, notifier, MAX_EVENTS_PER_FRAME)? == LoopControl::Quit {
            return Ok(());
        }

        let clock = chrono::Local::now().format("%H:%M:%S").to_string();
        model.widgets.set_clock(&clock);
        model.widgets.draw(&mut stdout).map_err(terminal)?;

        if signals.should_shutdown() {
            tracing::info!("shutdown signal received");
            return Ok(());
        }

        if !event::poll(poll).map_err(terminal)? {
            continue;
        }
        let msg = match event::read().map_err(terminal)? {
            Event::Key(key) if is_quit_key(&key) => DashboardMsg::Quit,
            Event::Resize(cols, rows) => {
                model.widgets.resize(cols, rows);
                DashboardMsg::Resize { cols, rows }
            }
            _ => continue,
        };
        if execute(update(model, msg), notifier)? == LoopControl::Quit {
            return Ok(());
        }
    }
}

/// Apply up to `max` pending telemetry events, in arrival order.
pub fn drain_events<W: WidgetToolkit>(
    model: &mut DashboardModel<W>,
    rx: &Receiver<TelemetryEvent>,
    notifier: &mut NotificationManager,
    max: usize,
) -> Result<LoopControl> {
    for _ in 0..max {
        let event = match rx.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        };
        if execute(update(model, DashboardMsg::Telemetry(event)), notifier)? == LoopControl::Quit {
            return Ok(LoopControl::Quit);
        }
    }
    Ok(LoopControl::Continue)
}

/// Execute a command returned by `update()`.
pub fn execute(cmd: DashboardCmd, notifier: &mut NotificationManager) -> Result<LoopControl> {
    match cmd {
        DashboardCmd::None => Ok(LoopControl::Continue),
        DashboardCmd::Notify(event) => {
            notifier.notify(&event);
            Ok(LoopControl::Continue)
        }
        DashboardCmd::Quit => Ok(LoopControl::Quit),
        DashboardCmd::Fail(details) => Err(BpError::SourceClosed { details }),
    }
}

fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

// ──────────────────── tests ────────────────────
