//! Out-of-band completion alerts.

pub mod notifications;

pub use notifications::{
    DesktopConfig, NotificationConfig, NotificationEvent, NotificationManager, Notifier,
    NtfyConfig, SystemNotifier,
};
