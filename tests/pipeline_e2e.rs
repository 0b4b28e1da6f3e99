//! End-to-end pipeline checks through the public API: snapshots in, widget
//! updates and completion notifications out.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use parking_lot::Mutex;

use bambu_progress::core::config::DashboardConfig;
use bambu_progress::notify::{NotificationConfig, NotificationManager, Notifier};
use bambu_progress::telemetry::{
    ReplaySource, StatusSnapshot, Subscription, TelemetryEvent, TelemetrySource,
};
use bambu_progress::tui::model::{ConnectionStatus, DashboardCmd, DashboardModel, DashboardMsg};
use bambu_progress::tui::runtime::{LoopControl, drain_events, execute};
use bambu_progress::tui::update::update;
use bambu_progress::tui::widgets::{WidgetId, WidgetToolkit};

#[derive(Debug, Default)]
struct RecordingToolkit {
    progress: Vec<f64>,
    texts: Vec<(WidgetId, String)>,
}

impl RecordingToolkit {
    fn last_text(&self, id: WidgetId) -> Option<&str> {
        self.texts
            .iter()
            .rev()
            .find(|(w, _)| *w == id)
            .map(|(_, t)| t.as_str())
    }
}

impl WidgetToolkit for RecordingToolkit {
    fn set_text(&mut self, id: WidgetId, text: &str) {
        self.texts.push((id, text.to_string()));
    }

    fn set_progress(&mut self, id: WidgetId, progress: f64, _total: Option<f64>) {
        if id == WidgetId::Progress {
            self.progress.push(progress);
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent.lock().push((title.to_string(), body.to_string()));
    }

    fn publish(&self, _topic: &str, _body: &str) {}
}

fn desktop_only(recorder: &Arc<RecordingNotifier>) -> NotificationManager {
    let config = NotificationConfig {
        channels: vec!["desktop".to_string()],
        ..NotificationConfig::default()
    };
    NotificationManager::with_notifier(&config, recorder.clone())
}

fn lowercase_settings() -> DashboardConfig {
    DashboardConfig {
        finished_state: "finished".to_string(),
        ..DashboardConfig::default()
    }
}

fn snapshot(seq: u32, state: Option<&str>, progress: u32) -> StatusSnapshot {
    StatusSnapshot {
        sequence_id: Some(seq.to_string()),
        job_state: state.map(str::to_string),
        job_type: Some("local".to_string()),
        job_task_name: Some("calibration cube".to_string()),
        progress_percent: Some(progress),
        ..StatusSnapshot::default()
    }
}

#[test]
fn running_to_finished_renders_and_notifies_exactly_once() {
    let recorder = Arc::new(RecordingNotifier::default());
    let mut notifier = desktop_only(&recorder);
    let mut model = DashboardModel::new(lowercase_settings(), RecordingToolkit::default(), "test", (80, 24));

    let sequence = [
        snapshot(1, None, 0),
        snapshot(2, Some("running"), 10),
        snapshot(3, Some("running"), 55),
        snapshot(4, Some("finished"), 100),
    ];
    let mut notify_cmds = 0;
    for s in sequence {
        let cmd = update(&mut model, DashboardMsg::Telemetry(TelemetryEvent::Snapshot(Box::new(s))));
        if matches!(cmd, DashboardCmd::Notify(_)) {
            notify_cmds += 1;
        }
        assert_eq!(execute(cmd, &mut notifier).unwrap(), LoopControl::Continue);
    }

    assert_eq!(model.widgets.progress, vec![10.0, 55.0, 100.0]);
    assert_eq!(notify_cmds, 1);
    let sent = recorder.sent.lock();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("calibration cube"));
    assert_eq!(model.controller.last_job_state(), Some("finished"));
    assert_eq!(model.widgets.last_text(WidgetId::Sequence), Some("msg 4"));
}

#[test]
fn repeated_finished_reports_do_not_notify_again() {
    let recorder = Arc::new(RecordingNotifier::default());
    let mut notifier = desktop_only(&recorder);
    let mut model = DashboardModel::new(lowercase_settings(), RecordingToolkit::default(), "test", (80, 24));
    let (tx, rx) = bounded(16);
    for (seq, state) in [(1, "running"), (2, "finished"), (3, "finished"), (4, "finished")] {
        tx.send(TelemetryEvent::Snapshot(Box::new(snapshot(seq, Some(state), 100))))
            .unwrap();
    }
    tx.send(TelemetryEvent::Ready).unwrap();
    tx.send(TelemetryEvent::Ready).unwrap();

    drain_events(&mut model, &rx, &mut notifier, 64).unwrap();
    assert_eq!(recorder.sent.lock().len(), 1);
    assert_eq!(model.connection, ConnectionStatus::Live);
}

#[test]
fn finished_as_first_observation_is_silent() {
    let recorder = Arc::new(RecordingNotifier::default());
    let mut notifier = desktop_only(&recorder);
    let mut model = DashboardModel::new(lowercase_settings(), RecordingToolkit::default(), "test", (80, 24));
    let cmd = update(
        &mut model,
        DashboardMsg::Telemetry(TelemetryEvent::Snapshot(Box::new(snapshot(9, Some("finished"), 100)))),
    );
    execute(cmd, &mut notifier).unwrap();
    assert!(recorder.sent.lock().is_empty());
    assert_eq!(model.widgets.progress, vec![100.0]);
}

#[test]
fn replay_source_feeds_controller_in_file_order() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let lines = [
        r#"{"print":{"sequence_id":"10"}}"#,
        r#"{"print":{"sequence_id":"11","gcode_state":"RUNNING","subtask_name":"vase","mc_percent":20}}"#,
        r#"{"print":{"sequence_id":"12","mc_percent":"60"}}"#,
        r#"{"print":{"sequence_id":"13","gcode_state":"FINISH","mc_percent":100}}"#,
    ];
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();

    let recorder = Arc::new(RecordingNotifier::default());
    let mut notifier = desktop_only(&recorder);
    let mut model =
        DashboardModel::new(DashboardConfig::default(), RecordingToolkit::default(), "replay", (80, 24));

    let (tx, rx) = bounded(4);
    let source = ReplaySource::new(file.path().to_path_buf(), Duration::ZERO);
    assert!(source.describe().starts_with("replay "));
    let subscription = Subscription::open(source, tx).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while model.connection != ConnectionStatus::Ended {
        assert!(Instant::now() < deadline, "replay did not finish");
        drain_events(&mut model, &rx, &mut notifier, 8).unwrap();
        std::thread::sleep(Duration::from_millis(5));
    }
    drop(subscription);

    // The ready signal re-renders the first state once.
    let mut progress = model.widgets.progress.clone();
    progress.dedup();
    assert_eq!(progress, vec![20.0, 60.0, 100.0]);
    assert_eq!(model.widgets.last_text(WidgetId::Sequence), Some("msg 13"));
    assert_eq!(
        *recorder.sent.lock(),
        vec![("Finished printing".to_string(), "Your print 'vase' is done.".to_string())]
    );
}
