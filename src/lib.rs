#![forbid(unsafe_code)]

//! Bambu Progress: live terminal dashboard for Bambu Lab 3D printers.
//!
//! Telemetry reports arrive from the printer's MQTT broker (or a recorded
//! file), are merged into a [`StatusSnapshot`](telemetry::StatusSnapshot),
//! rendered onto a fixed widget tree, and watched for the edge into the
//! finished state, which raises exactly one completion notification per
//! print.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use bambu_progress::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use bambu_progress::core::config::Config;
//! use bambu_progress::tui::transition::{TransitionDetector, Transition};
//! ```

pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod logger;
pub mod notify;
pub mod telemetry;
pub mod tui;
