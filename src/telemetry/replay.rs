//! Recorded telemetry played back from a file.
//!
//! The file holds one device report per line, exactly as `mosquitto_sub`
//! prints them. Lines are paced by a fixed interval so the dashboard can be
//! watched offline; end of file closes the stream normally.

#![allow(missing_docs)]

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::core::errors::{BpError, Result};
use crate::telemetry::source::{LinePump, TelemetryEvent, TelemetrySource, sleep_unless_stopped};

/// Telemetry source that replays a JSON-lines recording.
pub struct ReplaySource {
    path: PathBuf,
    interval: Duration,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl ReplaySource {
    #[must_use]
    pub fn new(path: impl AsRef<Path>, interval: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            interval,
            stop: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }
}

impl TelemetrySource for ReplaySource {
    fn subscribe(&mut self, sink: Sender<TelemetryEvent>) -> Result<()> {
        self.unsubscribe();
        self.stop.store(false, Ordering::Relaxed);

        let file = File::open(&self.path).map_err(|source| BpError::io(&self.path, source))?;
        let interval = self.interval;
        let stop = Arc::clone(&self.stop);
        let path = self.path.clone();
        let mut pump = LinePump::new(sink, Arc::clone(&self.stop), "replay");

        let handle = thread::Builder::new()
            .name("bp-replay".to_string())
            .spawn(move || {
                let mut first = true;
                for line in BufReader::new(file).lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(error) => {
                            pump.close(Some(format!("{}: {error}", path.display())));
                            return;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if !first && !sleep_unless_stopped(interval, &stop) {
                        return;
                    }
                    first = false;
                    if !pump.feed(&line) {
                        return;
                    }
                }
                pump.close(None);
            })
            .map_err(|source| BpError::Runtime {
                details: format!("failed to spawn replay thread: {source}"),
            })?;

        self.reader = Some(handle);
        tracing::info!(path = %self.path.display(), interval_ms = self.interval.as_millis(), "replay started");
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }

    fn describe(&self) -> String {
        format!("replay {}", self.path.display())
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
