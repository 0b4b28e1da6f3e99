//! Printer telemetry: snapshot record, report accumulation, and the
//! sources that feed the display loop.

pub mod mosquitto;
pub mod replay;
pub mod report;
pub mod snapshot;
pub mod source;

pub use mosquitto::MosquittoSource;
pub use replay::ReplaySource;
pub use report::ReportAccumulator;
pub use snapshot::{Light, StatusSnapshot};
pub use source::{SourceSpec, Subscription, TelemetryEvent, TelemetrySource};
