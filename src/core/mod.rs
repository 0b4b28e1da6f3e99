//! Core types: errors, configuration, paths, shutdown signals.

pub mod config;
pub mod errors;
pub mod paths;
pub mod signals;
