//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use bambu_progress::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, DashboardConfig, PrinterConfig};
pub use crate::core::errors::{BpError, Result};
pub use crate::core::signals::SignalHandler;

// Telemetry
pub use crate::telemetry::{
    ReportAccumulator, SourceSpec, StatusSnapshot, Subscription, TelemetryEvent, TelemetrySource,
};

// Notifications
pub use crate::notify::{NotificationEvent, NotificationManager, Notifier};

// Dashboard
pub use crate::tui::controller::DashboardController;
pub use crate::tui::presentation::PresentationState;
pub use crate::tui::render::render;
pub use crate::tui::transition::{Transition, TransitionDetector};
pub use crate::tui::widgets::{WidgetId, WidgetToolkit};
pub use crate::tui::{DashboardRuntimeConfig, run_dashboard};
