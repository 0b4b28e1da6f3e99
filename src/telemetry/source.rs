//! Telemetry source boundary: event type, source trait, scoped subscription,
//! and the line pump shared by the concrete sources.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender};

use crate::core::config::PrinterConfig;
use crate::core::errors::Result;
use crate::telemetry::mosquitto::MosquittoSource;
use crate::telemetry::replay::ReplaySource;
use crate::telemetry::report::ReportAccumulator;
use crate::telemetry::snapshot::StatusSnapshot;

/// How long a blocked delivery waits before re-checking the stop flag.
const SEND_RETRY: Duration = Duration::from_millis(100);

/// Events delivered from a source to the display loop, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// One decoded report (possibly uninitialized).
    Snapshot(Box<StatusSnapshot>),
    /// The source has obtained the device's full state.
    Ready,
    /// The stream ended. `error` is set for abnormal termination.
    Closed { error: Option<String> },
}

/// A producer of [`TelemetryEvent`]s.
///
/// `subscribe` starts delivery into `sink` from a background thread and
/// returns once the source is running; failure to start is fatal to the
/// caller. `unsubscribe` stops delivery, releases every OS resource, and
/// must be idempotent.
pub trait TelemetrySource: Send {
    fn subscribe(&mut self, sink: Sender<TelemetryEvent>) -> Result<()>;
    fn unsubscribe(&mut self);
    /// Short human-readable description for headers and logs.
    fn describe(&self) -> String;
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for Box<T> {
    fn subscribe(&mut self, sink: Sender<TelemetryEvent>) -> Result<()> {
        (**self).subscribe(sink)
    }

    fn unsubscribe(&mut self) {
        (**self).unsubscribe();
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Which source feeds the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// Live printer over MQTT.
    Mqtt(PrinterConfig),
    /// Recorded reports from a file, one line per `interval`.
    Replay { path: PathBuf, interval: Duration },
}

impl SourceSpec {
    #[must_use]
    pub fn build(self) -> Box<dyn TelemetrySource> {
        match self {
            Self::Mqtt(printer) => Box::new(MosquittoSource::new(printer)),
            Self::Replay { path, interval } => Box::new(ReplaySource::new(path, interval)),
        }
    }

    /// Title for the dashboard header.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Mqtt(printer) => printer.hostname.clone(),
            Self::Replay { path, .. } => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
        }
    }
}

/// Active subscription. Dropping it unsubscribes, whatever path the caller
/// leaves by.
pub struct Subscription<S: TelemetrySource> {
    source: S,
}

impl<S: TelemetrySource> Subscription<S> {
    pub fn open(mut source: S, sink: Sender<TelemetryEvent>) -> Result<Self> {
        source.subscribe(sink)?;
        tracing::info!(source = %source.describe(), "telemetry subscription opened");
        Ok(Self { source })
    }

    #[must_use]
    pub fn describe(&self) -> String {
        self.source.describe()
    }
}

impl<S: TelemetrySource> Drop for Subscription<S> {
    fn drop(&mut self) {
        self.source.unsubscribe();
        tracing::info!(source = %self.source.describe(), "telemetry subscription released");
    }
}

// ──────────────────── line pump ────────────────────

/// Feeds newline-delimited JSON reports through a [`ReportAccumulator`] and
/// forwards the resulting events. Used on the reader thread of each source.
pub(crate) struct LinePump {
    accumulator: ReportAccumulator,
    sink: Sender<TelemetryEvent>,
    stop: Arc<AtomicBool>,
    origin: &'static str,
}

impl LinePump {
    pub(crate) fn new(sink: Sender<TelemetryEvent>, stop: Arc<AtomicBool>, origin: &'static str) -> Self {
        Self {
            accumulator: ReportAccumulator::new(),
            sink,
            stop,
            origin,
        }
    }

    /// Reports merged so far on this stream.
    pub(crate) const fn reports(&self) -> u64 {
        self.accumulator.reports()
    }

    pub(crate) fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Process one line. Returns `false` once delivery should end.
    pub(crate) fn feed(&mut self, line: &str) -> bool {
        if self.stopped() {
            return false;
        }
        if line.trim().is_empty() {
            return true;
        }

        match self.accumulator.ingest(line) {
            Ok(Some(ingested)) => {
                tracing::trace!(
                    origin = self.origin,
                    sequence_id = ingested.snapshot.sequence_id.as_deref().unwrap_or("-"),
                    job_state = ingested.snapshot.job_state().unwrap_or("-"),
                    "report merged"
                );
                if !self.deliver(TelemetryEvent::Snapshot(Box::new(ingested.snapshot))) {
                    return false;
                }
                if ingested.became_ready {
                    tracing::info!(origin = self.origin, "full printer state received");
                    return self.deliver(TelemetryEvent::Ready);
                }
                true
            }
            Ok(None) => true,
            Err(error) => {
                tracing::warn!(origin = self.origin, %error, "skipping unreadable report");
                true
            }
        }
    }

    /// Final event for the stream. Suppressed when the stop was requested.
    pub(crate) fn close(&self, error: Option<String>) {
        if self.stopped() {
            return;
        }
        let reports = self.reports();
        match &error {
            Some(details) => tracing::error!(
                origin = self.origin,
                reports,
                details = %details,
                "telemetry stream failed"
            ),
            None => tracing::info!(origin = self.origin, reports, "telemetry stream ended"),
        }
        let _ = self.deliver(TelemetryEvent::Closed { error });
    }

    /// Blocking send that gives up when the receiver is gone or a stop is requested.
    fn deliver(&self, event: TelemetryEvent) -> bool {
        let mut pending = event;
        loop {
            match self.sink.send_timeout(pending, SEND_RETRY) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(event)) => {
                    if self.stopped() {
                        return false;
                    }
                    pending = event;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

/// Sleep for `total`, waking early when `stop` is raised. Returns `false` if stopped.
pub(crate) fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    const SLICE: Duration = Duration::from_millis(25);
    let mut remaining = total;
    while !remaining.is_zero() {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
    !stop.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn pump_forwards_snapshot_then_ready() {
        let (tx, rx) = bounded(8);
        let mut pump = LinePump::new(tx, Arc::new(AtomicBool::new(false)), "test");

        assert!(pump.feed(r#"{"print":{"sequence_id":"1"}}"#));
        assert!(pump.feed("not json"));
        assert!(pump.feed("   "));
        assert!(pump.feed(r#"{"print":{"gcode_state":"IDLE"}}"#));

        let events: Vec<TelemetryEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], TelemetryEvent::Snapshot(s) if !s.is_initialized()));
        assert!(matches!(&events[1], TelemetryEvent::Snapshot(s) if s.is_initialized()));
        assert_eq!(events[2], TelemetryEvent::Ready);
        assert_eq!(pump.reports(), 2);
    }

    #[test]
    fn pump_stops_when_receiver_dropped() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let mut pump = LinePump::new(tx, Arc::new(AtomicBool::new(false)), "test");
        assert!(!pump.feed(r#"{"print":{"gcode_state":"IDLE"}}"#));
    }

    #[test]
    fn full_channel_unblocks_on_stop() {
        let (tx, _rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let mut pump = LinePump::new(tx, Arc::clone(&stop), "test");
        assert!(pump.feed(r#"{"print":{"sequence_id":"1"}}"#));

        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || pump.feed(r#"{"print":{"sequence_id":"2"}}"#));
        std::thread::sleep(Duration::from_millis(150));
        flag.store(true, Ordering::Relaxed);
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn close_is_silent_after_stop() {
        let (tx, rx) = bounded(4);
        let stop = Arc::new(AtomicBool::new(false));
        let pump = LinePump::new(tx, Arc::clone(&stop), "test");
        pump.close(Some("boom".to_string()));
        stop.store(true, Ordering::Relaxed);
        pump.close(None);
        let events: Vec<TelemetryEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![TelemetryEvent::Closed {
                error: Some("boom".to_string())
            }]
        );
    }

    struct CountingSource {
        unsubscribed: Arc<AtomicBool>,
    }

    impl TelemetrySource for CountingSource {
        fn subscribe(&mut self, _sink: Sender<TelemetryEvent>) -> Result<()> {
            Ok(())
        }

        fn unsubscribe(&mut self) {
            self.unsubscribed.store(true, Ordering::Relaxed);
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn subscription_releases_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let (tx, _rx) = bounded(1);
        {
            let sub = Subscription::open(
                CountingSource {
                    unsubscribed: Arc::clone(&flag),
                },
                tx,
            )
            .unwrap();
            assert_eq!(sub.describe(), "counting");
            assert!(!flag.load(Ordering::Relaxed));
        }
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn boxed_source_delegates() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut boxed: Box<dyn TelemetrySource> = Box::new(CountingSource {
            unsubscribed: Arc::clone(&flag),
        });
        boxed.unsubscribe();
        assert!(flag.load(Ordering::Relaxed));
        assert_eq!(boxed.describe(), "counting");
    }

    #[test]
    fn source_spec_titles() {
        let printer = PrinterConfig {
            hostname: "p1s.lan".to_string(),
            ..PrinterConfig::default()
        };
        assert_eq!(SourceSpec::Mqtt(printer).title(), "p1s.lan");
        let replay = SourceSpec::Replay {
            path: PathBuf::from("/tmp/recordings/print.jsonl"),
            interval: Duration::ZERO,
        };
        assert_eq!(replay.title(), "print.jsonl");
        assert_eq!(replay.build().describe(), "replay /tmp/recordings/print.jsonl");
    }

    #[test]
    fn interrupted_sleep_reports_stop() {
        let stop = AtomicBool::new(true);
        assert!(!sleep_unless_stopped(Duration::from_secs(5), &stop));
        let go = AtomicBool::new(false);
        assert!(sleep_unless_stopped(Duration::from_millis(10), &go));
    }
}
