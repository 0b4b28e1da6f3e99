//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::control;
use thiserror::Error;

use bambu_progress::cli::printout::run_printout;
use bambu_progress::core::config::Config;
use bambu_progress::core::errors::BpError;
use bambu_progress::core::paths::resolve_absolute_path;
use bambu_progress::core::signals::SignalHandler;
use bambu_progress::logger::{self, LogOutcome, LogTarget};
use bambu_progress::notify::NotificationManager;
use bambu_progress::telemetry::SourceSpec;
use bambu_progress::tui::{DashboardRuntimeConfig, run_dashboard};

/// Live status dashboard for Bambu Lab 3D printers.
#[derive(Debug, Parser)]
#[command(
    name = "bambu-progress",
    author,
    version,
    about = "Bambu Progress - live printer status dashboard",
    long_about = None
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Override the dashboard log file.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute (defaults to `dashboard`).
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Full-screen live dashboard.
    Dashboard(WatchArgs),
    /// Plain-text status blocks on stdout.
    Print(WatchArgs),
    /// Show the effective configuration (access code redacted).
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Default, Args)]
struct WatchArgs {
    /// Replay recorded report lines from a file instead of connecting.
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,
    /// Delay between replayed lines.
    #[arg(long, default_value_t = 500, value_name = "MS")]
    replay_interval_ms: u64,
    /// Do not send completion notifications.
    #[arg(long)]
    no_notify: bool,
}

#[derive(Debug, Clone, Default, Args)]
struct ConfigArgs {
    /// Emit JSON instead of TOML.
    #[arg(long)]
    json: bool,
}

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad flags, configuration, or credentials.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<BpError> for CliError {
    fn from(error: BpError) -> Self {
        match error {
            BpError::InvalidConfig { .. }
            | BpError::MissingConfig { .. }
            | BpError::ConfigParse { .. }
            | BpError::MissingCredential { .. } => Self::User(error.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = &cli.log_file {
        config.paths.log_file = resolve_absolute_path(path);
    }

    match cli.command.clone().unwrap_or_else(|| Command::Dashboard(WatchArgs::default_watch())) {
        Command::Dashboard(args) => run_dashboard_command(cli, &config, &args),
        Command::Print(args) => run_print_command(cli, &config, &args),
        Command::Config(args) => run_config(&config, &args),
    }
}

impl WatchArgs {
    /// Defaults used when no subcommand is given; mirrors the clap defaults.
    fn default_watch() -> Self {
        Self {
            replay_interval_ms: 500,
            ..Self::default()
        }
    }

    fn source(&self, config: &Config) -> Result<SourceSpec, CliError> {
        match &self.replay {
            Some(path) => Ok(SourceSpec::Replay {
                path: resolve_absolute_path(path),
                interval: Duration::from_millis(self.replay_interval_ms),
            }),
            None => {
                config.require_printer()?;
                Ok(SourceSpec::Mqtt(config.printer.clone()))
            }
        }
    }

    fn notifier(&self, config: &Config) -> NotificationManager {
        if self.no_notify {
            NotificationManager::disabled()
        } else {
            NotificationManager::from_config(&config.notifications)
        }
    }
}

fn run_dashboard_command(cli: &Cli, config: &Config, args: &WatchArgs) -> Result<(), CliError> {
    let source = args.source(config)?;
    if let LogOutcome::Disabled { reason } =
        logger::init(&LogTarget::File(config.paths.log_file.clone()), cli.verbose)
    {
        eprintln!("bambu-progress: logging disabled: {reason}");
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        source = %source.title(),
        "starting dashboard"
    );

    let mut notifier = args.notifier(config);
    let runtime = DashboardRuntimeConfig {
        settings: config.dashboard.clone(),
        source,
    };
    run_dashboard(&runtime, &mut notifier, &SignalHandler::new())?;
    Ok(())
}

fn run_print_command(cli: &Cli, config: &Config, args: &WatchArgs) -> Result<(), CliError> {
    let source = args.source(config)?;
    let _ = logger::init(&LogTarget::Stderr, cli.verbose);
    tracing::info!(source = %source.title(), "starting printout");

    let mut notifier = args.notifier(config);
    let mut stdout = io::stdout().lock();
    run_printout(
        source,
        &config.dashboard,
        &mut notifier,
        &SignalHandler::new(),
        &mut stdout,
    )?;
    Ok(())
}

fn run_config(config: &Config, args: &ConfigArgs) -> Result<(), CliError> {
    let redacted = config.redacted();
    let mut stdout = io::stdout().lock();
    if args.json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&redacted)?)?;
    } else {
        writeln!(stdout, "# {}", redacted.paths.config_file.display())?;
        write!(stdout, "{}", redacted.to_toml()?)?;
    }
    Ok(())
}
