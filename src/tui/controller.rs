//! Per-snapshot orchestration: liveness label, initialization filter,
//! presentation, rendering, and completion detection.

#![allow(missing_docs)]

use crate::core::config::DashboardConfig;
use crate::notify::NotificationEvent;
use crate::telemetry::snapshot::StatusSnapshot;
use crate::tui::presentation::{self, PresentationState};
use crate::tui::render::render;
use crate::tui::transition::{Transition, TransitionDetector};
use crate::tui::widgets::{WidgetId, WidgetToolkit};

/// Owns the last observed job state. Snapshots must be fed one at a time,
/// in arrival order.
#[derive(Debug, Clone)]
pub struct DashboardController {
    settings: DashboardConfig,
    detector: TransitionDetector,
    last_job_state: Option<String>,
    last_presentation: Option<PresentationState>,
    processed: u64,
}

impl DashboardController {
    #[must_use]
    pub fn new(settings: DashboardConfig) -> Self {
        let detector = TransitionDetector::new(settings.finished_state.clone());
        Self {
            settings,
            detector,
            last_job_state: None,
            last_presentation: None,
            processed: 0,
        }
    }

    /// Handle one snapshot. Returns the completion event to dispatch, if any.
    ///
    /// Uninitialized snapshots only touch the sequence label.
    pub fn on_snapshot<W: WidgetToolkit + ?Sized>(
        &mut self,
        snapshot: &StatusSnapshot,
        widgets: &mut W,
    ) -> Option<NotificationEvent> {
        widgets.set_text(WidgetId::Sequence, &sequence_label(snapshot));

        let Some(current) = snapshot.job_state() else {
            tracing::trace!("snapshot before full state, skipped");
            return None;
        };
        let presentation = presentation::build(snapshot, &self.settings)?;
        render(&presentation, widgets);
        self.last_presentation = Some(presentation);
        self.processed += 1;

        let event = match self.detector.detect(self.last_job_state.as_deref(), current) {
            Transition::JobFinished => {
                tracing::info!(
                    previous = self.last_job_state.as_deref().unwrap_or("-"),
                    job_state = current,
                    task = snapshot.task_name(),
                    "job finished"
                );
                Some(NotificationEvent::PrintFinished {
                    task_name: snapshot.task_name().to_string(),
                })
            }
            Transition::None => {
                if self.last_job_state.as_deref() != Some(current) {
                    tracing::debug!(
                        previous = self.last_job_state.as_deref().unwrap_or("-"),
                        job_state = current,
                        "job state changed"
                    );
                }
                None
            }
        };

        self.last_job_state = Some(current.to_string());
        event
    }

    /// Render the last presentation again (after a resize or a repeated ready signal).
    pub fn rerender<W: WidgetToolkit + ?Sized>(&self, widgets: &mut W) -> bool {
        match &self.last_presentation {
            Some(p) => {
                render(p, widgets);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn last_job_state(&self) -> Option<&str> {
        self.last_job_state.as_deref()
    }

    #[must_use]
    pub const fn last_presentation(&self) -> Option<&PresentationState> {
        self.last_presentation.as_ref()
    }

    /// Initialized snapshots handled so far.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.processed
    }

    #[must_use]
    pub const fn settings(&self) -> &DashboardConfig {
        &self.settings
    }
}

/// Liveness text shown for every snapshot, initialized or not.
#[must_use]
pub fn sequence_label(snapshot: &StatusSnapshot) -> String {
    format!("msg {}", snapshot.sequence_id.as_deref().unwrap_or("-"))
}
