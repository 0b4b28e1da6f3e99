//! Accumulation of raw device reports into status snapshots.
//!
//! The printer pushes deltas: most reports only carry the keys that changed.
//! The accumulator keeps the merged `print` object and decodes a fresh
//! [`StatusSnapshot`] from it after every report.

#![allow(missing_docs)]

use serde_json::{Map, Value};

use crate::core::errors::{BpError, Result};
use crate::telemetry::snapshot::StatusSnapshot;

/// Result of feeding one report into the accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub snapshot: StatusSnapshot,
    /// Set on the first initialized snapshot since construction or [`ReportAccumulator::reset`].
    pub became_ready: bool,
}

/// Merged key/value state of the device's `print` reports.
#[derive(Debug, Default)]
pub struct ReportAccumulator {
    fields: Map<String, Value>,
    ready: bool,
    reports: u64,
}

impl ReportAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one JSON payload.
    ///
    /// Returns `Ok(None)` for well-formed payloads without a `print` object
    /// (`info`, `system`, command acknowledgements).
    pub fn ingest(&mut self, payload: &str) -> Result<Option<Ingested>> {
        let document: Value =
            serde_json::from_str(payload.trim()).map_err(|error| BpError::ReportParse {
                details: error.to_string(),
            })?;

        let Some(Value::Object(print)) = document.get("print") else {
            return Ok(None);
        };

        for (key, value) in print {
            self.fields.insert(key.clone(), value.clone());
        }
        self.reports += 1;

        let snapshot = StatusSnapshot::from_fields(&self.fields)?;
        let became_ready = !self.ready && snapshot.is_initialized();
        if became_ready {
            self.ready = true;
        }

        Ok(Some(Ingested {
            snapshot,
            became_ready,
        }))
    }

    /// Forget all merged state (new connection).
    pub fn reset(&mut self) {
        self.fields.clear();
        self.ready = false;
        self.reports = 0;
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of `print` reports merged since the last reset.
    #[must_use]
    pub const fn reports(&self) -> u64 {
        self.reports
    }
}
