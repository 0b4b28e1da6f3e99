//! Command-line surfaces that sit beside the dashboard.

pub mod printout;
