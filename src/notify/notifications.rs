//! Multi-channel completion notifications: desktop, ntfy push, and log.
//!
//! Dispatch is fire-and-forget. Every external call runs on a detached thread
//! that owns the child process; failures are logged there and never travel
//! back into the telemetry pipeline.

#![allow(missing_docs)]

use std::fmt;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

// ──────────────────── notification events ────────────────────

/// A structured notification event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// The job state changed into the finished state.
    PrintFinished { task_name: String },
}

impl NotificationEvent {
    /// Notification title (desktop summary line).
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::PrintFinished { .. } => "Finished printing",
        }
    }

    /// Human-readable body.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::PrintFinished { task_name } => format!("Your print '{task_name}' is done."),
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title(), self.message())
    }
}

// ──────────────────── configuration ────────────────────

/// Top-level notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Master switch for all notifications.
    pub enabled: bool,
    /// Which channel names to activate.
    pub channels: Vec<String>,
    pub desktop: DesktopConfig,
    pub ntfy: NtfyConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: vec![
                "desktop".to_string(),
                "ntfy".to_string(),
                "log".to_string(),
            ],
            desktop: DesktopConfig::default(),
            ntfy: NtfyConfig::default(),
        }
    }
}

/// Desktop notification settings (notify-send on Linux, osascript on macOS).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DesktopConfig {
    pub enabled: bool,
    pub app_name: String,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "bambu-progress".to_string(),
        }
    }
}

/// ntfy push settings. The channel stays inactive until a topic is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NtfyConfig {
    pub server: String,
    pub topic: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            server: "https://ntfy.sh".to_string(),
            topic: None,
            timeout_secs: 10,
        }
    }
}

// ──────────────────── notifier boundary ────────────────────

/// Out-of-band delivery of a completion alert. Both calls return immediately.
pub trait Notifier: Send + Sync {
    /// Desktop notification with a title and body.
    fn notify(&self, title: &str, body: &str);
    /// Push `body` to a remote topic.
    fn publish(&self, topic: &str, body: &str);
}

/// [`Notifier`] backed by `notify-send`/`osascript` and `curl`.
#[derive(Debug, Clone)]
pub struct SystemNotifier {
    app_name: String,
    ntfy_server: String,
    timeout_secs: u64,
}

impl SystemNotifier {
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            app_name: config.desktop.app_name.clone(),
            ntfy_server: config.ntfy.server.trim_end_matches('/').to_string(),
            timeout_secs: config.ntfy.timeout_secs.max(1),
        }
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/{topic}", self.ntfy_server)
    }

    #[cfg(target_os = "macos")]
    fn desktop_command(&self, title: &str, body: &str) -> Command {
        let script = format!(
            "display notification \"{}\" with title \"{}\" subtitle \"{}\"",
            body.replace('"', "\\\""),
            self.app_name.replace('"', "\\\""),
            title.replace('"', "\\\""),
        );
        let mut cmd = Command::new("osascript");
        cmd.arg("-e").arg(script);
        cmd
    }

    #[cfg(not(target_os = "macos"))]
    fn desktop_command(&self, title: &str, body: &str) -> Command {
        let mut cmd = Command::new("notify-send");
        cmd.arg(format!("--app-name={}", self.app_name))
            .arg(title)
            .arg(body);
        cmd
    }

    fn publish_command(&self, topic: &str, body: &str) -> Command {
        let mut cmd = Command::new("curl");
        cmd.arg("--silent")
            .arg("--show-error")
            .arg("--fail")
            .arg("--max-time")
            .arg(self.timeout_secs.to_string())
            .arg("--header")
            .arg("Content-Type: text/plain")
            .arg("--data-binary")
            .arg(body)
            .arg(self.topic_url(topic));
        cmd
    }
}

impl Notifier for SystemNotifier {
    fn notify(&self, title: &str, body: &str) {
        spawn_detached("desktop", self.desktop_command(title, body));
    }

    fn publish(&self, topic: &str, body: &str) {
        spawn_detached("ntfy", self.publish_command(topic, body));
    }
}

/// Run `cmd` on its own thread and log the outcome there.
fn spawn_detached(channel: &'static str, mut cmd: Command) {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let spawned = thread::Builder::new()
        .name(format!("bp-notify-{channel}"))
        .spawn(move || {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped());
            match cmd.output() {
                Ok(output) if output.status.success() => {
                    tracing::debug!(channel, program = %program, "notification delivered");
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    tracing::warn!(
                        channel,
                        program = %program,
                        status = %output.status,
                        stderr = %stderr.trim(),
                        "notification command failed"
                    );
                }
                Err(error) => {
                    tracing::warn!(channel, program = %program, %error, "notification command did not start");
                }
            }
        });
    if let Err(error) = spawned {
        tracing::warn!(channel, %error, "failed to spawn notification thread");
    }
}

// ──────────────────── notification manager ────────────────────

/// Channels a [`NotificationManager`] can route to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Channel {
    Desktop,
    Ntfy { topic: String },
    Log,
}

impl Channel {
    fn name(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Ntfy { .. } => "ntfy",
            Self::Log => "log",
        }
    }
}

/// Routes notification events to the configured channels.
///
/// Cheap to call from the display loop: the notifier calls return
/// immediately and notification failures never propagate.
pub struct NotificationManager {
    notifier: Arc<dyn Notifier>,
    channels: Vec<Channel>,
    enabled: bool,
    dispatched: u64,
}

impl NotificationManager {
    /// Build a manager with the system notifier.
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::with_notifier(config, Arc::new(SystemNotifier::from_config(config)))
    }

    /// Build a manager that delivers through `notifier`.
    #[must_use]
    pub fn with_notifier(config: &NotificationConfig, notifier: Arc<dyn Notifier>) -> Self {
        if !config.enabled {
            return Self {
                notifier,
                channels: Vec::new(),
                enabled: false,
                dispatched: 0,
            };
        }

        let mut channels = Vec::new();
        for channel_name in &config.channels {
            let channel = match channel_name.as_str() {
                "desktop" if config.desktop.enabled => Channel::Desktop,
                "ntfy" => match config.ntfy.topic.as_deref().map(str::trim) {
                    Some(topic) if !topic.is_empty() => Channel::Ntfy {
                        topic: topic.to_string(),
                    },
                    _ => continue,
                },
                "log" => Channel::Log,
                other => {
                    if other != "desktop" {
                        tracing::debug!(channel = other, "ignoring unknown notification channel");
                    }
                    continue;
                }
            };
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }

        Self {
            notifier,
            channels,
            enabled: true,
            dispatched: 0,
        }
    }

    /// Create a disabled (no-op) manager.
    #[must_use]
    pub fn disabled() -> Self {
        Self::with_notifier(
            &NotificationConfig {
                enabled: false,
                ..NotificationConfig::default()
            },
            Arc::new(SystemNotifier::from_config(&NotificationConfig::default())),
        )
    }

    /// Dispatch a notification event to all enabled channels.
    pub fn notify(&mut self, event: &NotificationEvent) {
        if !self.enabled {
            return;
        }
        self.dispatched += 1;

        let title = event.title();
        let body = event.message();
        for channel in &self.channels {
            match channel {
                Channel::Desktop => self.notifier.notify(title, &body),
                Channel::Ntfy { topic } => self.notifier.publish(topic, &body),
                Channel::Log => tracing::info!(event = ?event, "{title}: {body}"),
            }
        }
    }

    /// Number of events dispatched so far.
    #[must_use]
    pub const fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Whether the manager is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// List the names of active channels.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(Channel::name).collect()
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.calls
                .lock()
                .push(("notify".to_string(), title.to_string(), body.to_string()));
        }

        fn publish(&self, topic: &str, body: &str) {
            self.calls
                .lock()
                .push(("publish".to_string(), topic.to_string(), body.to_string()));
        }
    }

    fn finished(task: &str) -> NotificationEvent {
        NotificationEvent::PrintFinished {
            task_name: task.to_string(),
        }
    }

    #[test]
    fn print_finished_message_quotes_task_name() {
        let event = finished("benchy");
        assert_eq!(event.title(), "Finished printing");
        assert_eq!(event.message(), "Your print 'benchy' is done.");
        assert_eq!(
            event.to_string(),
            "Finished printing: Your print 'benchy' is done."
        );
    }

    #[test]
    fn default_config_without_topic_skips_ntfy() {
        let manager = NotificationManager::with_notifier(
            &NotificationConfig::default(),
            Arc::new(RecordingNotifier::default()),
        );
        assert!(manager.is_enabled());
        assert_eq!(manager.channel_names(), vec!["desktop", "log"]);
    }

    #[test]
    fn topic_activates_ntfy_channel() {
        let mut config = NotificationConfig::default();
        config.ntfy.topic = Some("my-prints".to_string());
        let recorder = Arc::new(RecordingNotifier::default());
        let mut manager = NotificationManager::with_notifier(&config, recorder.clone());
        assert_eq!(manager.channel_names(), vec!["desktop", "ntfy", "log"]);

        manager.notify(&finished("cube"));

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            (
                "notify".to_string(),
                "Finished printing".to_string(),
                "Your print 'cube' is done.".to_string()
            )
        );
        assert_eq!(calls[1].0, "publish");
        assert_eq!(calls[1].1, "my-prints");
    }

    #[test]
    fn blank_topic_is_treated_as_unset() {
        let mut config = NotificationConfig::default();
        config.ntfy.topic = Some("   ".to_string());
        let manager =
            NotificationManager::with_notifier(&config, Arc::new(RecordingNotifier::default()));
        assert!(!manager.channel_names().contains(&"ntfy"));
    }

    #[test]
    fn manager_skips_disabled_desktop() {
        let config = NotificationConfig {
            desktop: DesktopConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let manager =
            NotificationManager::with_notifier(&config, Arc::new(RecordingNotifier::default()));
        assert_eq!(manager.channel_names(), vec!["log"]);
    }

    #[test]
    fn duplicate_channel_names_collapse() {
        let config = NotificationConfig {
            channels: vec!["log".to_string(), "log".to_string(), "bogus".to_string()],
            ..Default::default()
        };
        let manager =
            NotificationManager::with_notifier(&config, Arc::new(RecordingNotifier::default()));
        assert_eq!(manager.channel_names(), vec!["log"]);
    }

    #[test]
    fn disabled_manager_is_noop() {
        let recorder = Arc::new(RecordingNotifier::default());
        let config = NotificationConfig {
            enabled: false,
            ..Default::default()
        };
        let mut manager = NotificationManager::with_notifier(&config, recorder.clone());
        manager.notify(&finished("cube"));
        assert_eq!(manager.dispatched(), 0);
        assert!(recorder.calls.lock().is_empty());
        assert!(!NotificationManager::disabled().is_enabled());
    }

    #[test]
    fn dispatch_counter_counts_events_not_channels() {
        let mut manager = NotificationManager::with_notifier(
            &NotificationConfig::default(),
            Arc::new(RecordingNotifier::default()),
        );
        manager.notify(&finished("a"));
        manager.notify(&finished("b"));
        assert_eq!(manager.dispatched(), 2);
    }

    #[test]
    fn publish_command_targets_topic_url() {
        let mut config = NotificationConfig::default();
        config.ntfy.server = "https://ntfy.example.org/".to_string();
        let notifier = SystemNotifier::from_config(&config);
        let cmd = notifier.publish_command("shop", "done");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(cmd.get_program(), "curl");
        assert_eq!(args.last().map(String::as_str), Some("https://ntfy.example.org/shop"));
        assert!(args.iter().any(|a| a == "Content-Type: text/plain"));
        assert!(args.iter().any(|a| a == "done"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn desktop_command_uses_notify_send() {
        let notifier = SystemNotifier::from_config(&NotificationConfig::default());
        let cmd = notifier.desktop_command("Finished printing", "Your print 'x' is done.");
        assert_eq!(cmd.get_program(), "notify-send");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "--app-name=bambu-progress");
        assert_eq!(args[1], "Finished printing");
    }

    #[test]
    fn notification_config_roundtrip_toml() {
        let mut config = NotificationConfig::default();
        config.ntfy.topic = Some("prints".to_string());
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: NotificationConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }
}
