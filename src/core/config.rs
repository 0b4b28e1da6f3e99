//! Configuration system: TOML file + `.env` + env var overrides + smart defaults.
//!
//! The printer credentials keep the variable names the Bambu tooling
//! ecosystem already uses (`BAMBU_HOSTNAME`, `BAMBU_ACCESS_CODE`,
//! `BAMBU_SERIAL`, `BAMBU_NTFY_TOPIC`), so an existing `.env` file works as is.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{BpError, Result};
use crate::core::paths;
use crate::notify::NotificationConfig;

/// Full bambu-progress configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub printer: PrinterConfig,
    pub dashboard: DashboardConfig,
    pub notifications: NotificationConfig,
    pub paths: PathsConfig,
}

/// Connection parameters for the printer's local MQTT broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PrinterConfig {
    pub hostname: String,
    pub access_code: String,
    pub serial: String,
    pub port: u16,
    pub username: String,
    /// PEM file holding the printer's self-signed `BBL CA` certificate.
    /// Required for live mode: the mosquitto clients always verify the
    /// certificate chain and cannot be told to skip it.
    pub ca_file: Option<PathBuf>,
    /// Skip the hostname check. The printer certificate names the serial,
    /// not the address used to reach it.
    pub tls_insecure: bool,
    /// Delay between subscribing and requesting the full status dump.
    pub full_state_delay_ms: u64,
    /// `mosquitto_sub` executable, looked up on `PATH` unless absolute.
    pub sub_program: PathBuf,
    /// `mosquitto_pub` executable, looked up on `PATH` unless absolute.
    pub pub_program: PathBuf,
}

/// Display and state-machine knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Firmware job-state tag that marks a completed print.
    pub finished_state: String,
    /// Full-scale value of the temperature bars (°C).
    pub temperature_scale: f64,
    /// Full-scale value of the fan bars (device units).
    pub fan_scale: u32,
    pub bar_width: u16,
    /// Bounded telemetry channel size between source and display loop.
    pub channel_capacity: usize,
    pub poll_interval_ms: u64,
}

/// Filesystem paths used by bambu-progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            access_code: String::new(),
            serial: String::new(),
            port: 8883,
            username: "bblp".to_string(),
            ca_file: None,
            tls_insecure: true,
            full_state_delay_ms: 1_000,
            sub_program: PathBuf::from("mosquitto_sub"),
            pub_program: PathBuf::from("mosquitto_pub"),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            finished_state: "FINISH".to_string(),
            temperature_scale: 300.0,
            fan_scale: 15,
            bar_width: 40,
            channel_capacity: 256,
            poll_interval_ms: 50,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: paths::default_config_file(),
            log_file: paths::default_log_file(),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        paths::default_config_file()
    }

    /// Load config from default or explicit path, then `.env`, then env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    /// A `.env` file in the working directory never overrides variables that
    /// are already set in the real environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(file) => tracing::debug!(file = %file.display(), "loaded .env"),
            Err(error) if error.not_found() => {}
            Err(error) => {
                return Err(BpError::ConfigParse {
                    context: "dotenv",
                    details: error.to_string(),
                });
            }
        }
        Self::load_with(path, env_var)
    }

    /// Same as [`Self::load`] but reads overrides through `lookup` and skips `.env`.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| BpError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(BpError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Ensure the credentials needed to reach the printer are present.
    pub fn require_printer(&self) -> Result<()> {
        for (name, value) in [
            ("BAMBU_HOSTNAME", &self.printer.hostname),
            ("BAMBU_ACCESS_CODE", &self.printer.access_code),
            ("BAMBU_SERIAL", &self.printer.serial),
        ] {
            if value.trim().is_empty() {
                return Err(BpError::MissingCredential { name });
            }
        }
        let Some(ca_file) = &self.printer.ca_file else {
            return Err(BpError::MissingCredential {
                name: "BAMBU_CA_FILE",
            });
        };
        if !ca_file.is_file() {
            return Err(BpError::InvalidConfig {
                details: format!("printer.ca_file {} is not a readable file", ca_file.display()),
            });
        }
        Ok(())
    }

    /// Copy safe for display: the access code is masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        if !cfg.printer.access_code.is_empty() {
            cfg.printer.access_code = "********".to_string();
        }
        cfg
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("BAMBU_HOSTNAME") {
            self.printer.hostname = raw.trim().to_string();
        }
        if let Some(raw) = lookup("BAMBU_ACCESS_CODE") {
            self.printer.access_code = raw.trim().to_string();
        }
        if let Some(raw) = lookup("BAMBU_SERIAL") {
            self.printer.serial = raw.trim().to_string();
        }
        if let Some(raw) = lookup("BAMBU_PORT") {
            self.printer.port = parse_env("BAMBU_PORT", &raw)?;
        }
        if let Some(raw) = lookup("BAMBU_CA_FILE") {
            self.printer.ca_file = Some(PathBuf::from(raw.trim()));
        }
        if let Some(raw) = lookup("BAMBU_FINISHED_STATE") {
            self.dashboard.finished_state = raw.trim().to_string();
        }
        if let Some(raw) = lookup("BAMBU_NTFY_TOPIC") {
            self.notifications.ntfy.topic = Some(raw.trim().to_string());
        }
        if let Some(raw) = lookup("BAMBU_NOTIFY_ENABLED") {
            self.notifications.enabled = parse_env("BAMBU_NOTIFY_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("BAMBU_LOG_FILE") {
            self.paths.log_file = PathBuf::from(raw.trim());
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let dash = &self.dashboard;
        if dash.finished_state.trim().is_empty() {
            return Err(BpError::InvalidConfig {
                details: "dashboard.finished_state must not be empty".to_string(),
            });
        }
        if !(dash.temperature_scale.is_finite() && dash.temperature_scale > 0.0) {
            return Err(BpError::InvalidConfig {
                details: format!(
                    "dashboard.temperature_scale must be > 0, got {}",
                    dash.temperature_scale
                ),
            });
        }
        if dash.fan_scale == 0 {
            return Err(BpError::InvalidConfig {
                details: "dashboard.fan_scale must be > 0".to_string(),
            });
        }
        if !(10..=200).contains(&dash.bar_width) {
            return Err(BpError::InvalidConfig {
                details: format!(
                    "dashboard.bar_width must be in [10, 200], got {}",
                    dash.bar_width
                ),
            });
        }
        if dash.channel_capacity == 0 {
            return Err(BpError::InvalidConfig {
                details: "dashboard.channel_capacity must be > 0".to_string(),
            });
        }
        if dash.poll_interval_ms == 0 {
            return Err(BpError::InvalidConfig {
                details: "dashboard.poll_interval_ms must be > 0".to_string(),
            });
        }
        if self.printer.port == 0 {
            return Err(BpError::InvalidConfig {
                details: "printer.port must be > 0".to_string(),
            });
        }

        let server = &self.notifications.ntfy.server;
        if !(server.starts_with("https://") || server.starts_with("http://")) {
            return Err(BpError::InvalidConfig {
                details: format!("notifications.ntfy.server must be an http(s) URL, got {server:?}"),
            });
        }
        if self
            .notifications
            .ntfy
            .topic
            .as_deref()
            .is_some_and(|topic| topic.contains('/') || topic.chars().any(char::is_whitespace))
        {
            return Err(BpError::InvalidConfig {
                details: "notifications.ntfy.topic must be a single path segment".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| BpError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{BpError, Config};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    fn load_with_vars(path: Option<&Path>, pairs: &[(&str, &str)]) -> Result<Config, BpError> {
        let overrides = vars(pairs);
        Config::load_with(path, |name| overrides.get(name).cloned())
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.printer.port, 8883);
        assert_eq!(cfg.printer.username, "bblp");
        assert_eq!(cfg.dashboard.finished_state, "FINISH");
    }

    #[test]
    fn printer_env_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let ca = dir.path().join("ca.pem");
        std::fs::write(&ca, "").unwrap();
        let cfg = load_with_vars(
            Some(&path),
            &[
                ("BAMBU_HOSTNAME", " 192.168.1.40 "),
                ("BAMBU_ACCESS_CODE", "12345678"),
                ("BAMBU_SERIAL", "01S00C123456789"),
                ("BAMBU_NTFY_TOPIC", "my-printer"),
                ("BAMBU_CA_FILE", ca.to_str().unwrap()),
            ],
        )
        .expect("env overrides should load");
        assert_eq!(cfg.printer.hostname, "192.168.1.40");
        assert_eq!(cfg.printer.access_code, "12345678");
        assert_eq!(cfg.printer.serial, "01S00C123456789");
        assert_eq!(cfg.notifications.ntfy.topic.as_deref(), Some("my-printer"));
        assert!(cfg.require_printer().is_ok());
    }

    #[test]
    fn invalid_port_env_rejected_with_variable_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let err = load_with_vars(Some(&path), &[("BAMBU_PORT", "eighty")]).unwrap_err();
        match err {
            BpError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("BAMBU_PORT"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_bool_env_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let err =
            load_with_vars(Some(&path), &[("BAMBU_NOTIFY_ENABLED", "yes-please")]).unwrap_err();
        assert_eq!(err.code(), "BP-1003");
    }

    #[test]
    fn require_printer_names_first_missing_credential() {
        let mut cfg = Config::default();
        cfg.printer.hostname = "printer.local".to_string();
        match cfg.require_printer().unwrap_err() {
            BpError::MissingCredential { name } => assert_eq!(name, "BAMBU_ACCESS_CODE"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn require_printer_needs_ca_file() {
        let mut cfg = Config::default();
        cfg.printer.hostname = "printer.local".to_string();
        cfg.printer.access_code = "12345678".to_string();
        cfg.printer.serial = "01S00C123456789".to_string();
        match cfg.require_printer().unwrap_err() {
            BpError::MissingCredential { name } => assert_eq!(name, "BAMBU_CA_FILE"),
            other => panic!("unexpected error: {other}"),
        }

        cfg.printer.ca_file = Some(PathBuf::from("/nonexistent/bambu/ca.pem"));
        let err = cfg.require_printer().unwrap_err();
        assert_eq!(err.code(), "BP-1001");
        assert!(err.to_string().contains("/nonexistent/bambu/ca.pem"));

        let ca = tempfile::NamedTempFile::new().unwrap();
        cfg.printer.ca_file = Some(ca.path().to_path_buf());
        assert!(cfg.require_printer().is_ok());
    }

    #[test]
    fn redacted_masks_access_code_only() {
        let mut cfg = Config::default();
        cfg.printer.hostname = "printer.local".to_string();
        cfg.printer.access_code = "secret42".to_string();
        let shown = cfg.redacted();
        assert_eq!(shown.printer.access_code, "********");
        assert_eq!(shown.printer.hostname, "printer.local");
        assert!(!shown.to_toml().unwrap().contains("secret42"));
    }

    #[test]
    fn bar_width_out_of_range_rejected() {
        let mut cfg = Config::default();
        cfg.dashboard.bar_width = 4;
        assert!(matches!(
            cfg.validate(),
            Err(BpError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn zero_scales_rejected() {
        let mut cfg = Config::default();
        cfg.dashboard.fan_scale = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.dashboard.temperature_scale = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ntfy_server_must_be_http() {
        let mut cfg = Config::default();
        cfg.notifications.ntfy.server = "ftp://ntfy.sh".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ntfy_topic_with_slash_rejected() {
        let mut cfg = Config::default();
        cfg.notifications.ntfy.topic = Some("a/b".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = load_with_vars(Some(&path), &[]).unwrap_err();
        assert!(matches!(err, BpError::MissingConfig { .. }));
    }

    #[test]
    fn load_reads_toml_then_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[printer]\nhostname = \"from-file\"\nserial = \"SERIAL1\"\n\n[dashboard]\nbar_width = 60\n",
        )
        .unwrap();

        let cfg = load_with_vars(Some(&path), &[("BAMBU_HOSTNAME", "from-env")]).unwrap();
        assert_eq!(cfg.printer.hostname, "from-env");
        assert_eq!(cfg.printer.serial, "SERIAL1");
        assert_eq!(cfg.dashboard.bar_width, 60);
        assert_eq!(cfg.paths.config_file, PathBuf::from(&path));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[printer\nhostname = ").unwrap();
        let err = load_with_vars(Some(&path), &[]).unwrap_err();
        assert_eq!(err.code(), "BP-1003");
    }

    #[test]
    fn example_config_parses_and_names_ca_file() {
        let cfg: Config = toml::from_str(include_str!("../../config.example.toml")).unwrap();
        assert!(cfg.validate().is_ok());
        assert!(cfg.printer.ca_file.is_some());
        assert!(cfg.printer.tls_insecure);
        assert_eq!(cfg.printer.sub_program, PathBuf::from("mosquitto_sub"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let mut cfg = Config::default();
        cfg.printer.ca_file = Some(PathBuf::from("/etc/bambu/ca.pem"));
        cfg.notifications.ntfy.topic = Some("prints".to_string());
        let raw = cfg.to_toml().unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();
        assert_eq!(cfg, parsed);
    }
}
