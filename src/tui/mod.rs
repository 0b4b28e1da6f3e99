//! Terminal dashboard: completion detection, presentation, rendering, and
//! the Elm-style display loop.

pub mod controller;
pub mod model;
pub mod presentation;
pub mod render;
pub mod runtime;
pub mod screen;
pub mod terminal_guard;
pub mod transition;
pub mod update;
pub mod widgets;

pub use controller::DashboardController;
pub use runtime::{DashboardRuntimeConfig, run_dashboard};
