//! Live printer telemetry through the mosquitto command-line clients.
//!
//! `mosquitto_sub` holds the TLS MQTT session and prints one JSON report per
//! line; a reader thread pumps those lines into the display channel while a
//! second thread drains its stderr. Shortly after the subscription starts,
//! `mosquitto_pub` sends a single `pushall` request so the printer answers
//! with its full state.
//!
//! The username and access code never appear on a command line. They are
//! written to a private options directory that both clients read through
//! `XDG_CONFIG_HOME`, and the directory is removed on unsubscribe.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::core::config::PrinterConfig;
use crate::core::errors::{BpError, Result};
use crate::telemetry::source::{LinePump, TelemetryEvent, TelemetrySource, sleep_unless_stopped};

const SUB_PROGRAM: &str = "mosquitto_sub";
const PUB_PROGRAM: &str = "mosquitto_pub";
/// The clients load `$XDG_CONFIG_HOME/mosquitto_sub` (and `_pub`) as default options.
const OPTIONS_ENV: &str = "XDG_CONFIG_HOME";
/// Stderr lines kept for the exit error.
const STDERR_TAIL_LINES: usize = 8;
const STDERR_LINE_CHARS: usize = 240;
const PUB_POLL: Duration = Duration::from_millis(25);
/// Full-state request understood by the printer firmware.
pub const PUSHALL_PAYLOAD: &str = r#"{"pushing":{"sequence_id":"0","command":"pushall"}}"#;

type ChildSlot = Arc<Mutex<Option<Child>>>;

/// Telemetry source backed by `mosquitto_sub`/`mosquitto_pub`.
pub struct MosquittoSource {
    printer: PrinterConfig,
    sub_child: ChildSlot,
    pub_child: ChildSlot,
    stop: Arc<AtomicBool>,
    options: Option<TempDir>,
    reader: Option<JoinHandle<()>>,
    pusher: Option<JoinHandle<()>>,
}

impl MosquittoSource {
    #[must_use]
    pub fn new(printer: PrinterConfig) -> Self {
        Self {
            printer,
            sub_child: Arc::new(Mutex::new(None)),
            pub_child: Arc::new(Mutex::new(None)),
            stop: Arc::new(AtomicBool::new(false)),
            options: None,
            reader: None,
            pusher: None,
        }
    }

    #[must_use]
    pub fn report_topic(&self) -> String {
        format!("device/{}/report", self.printer.serial)
    }

    #[must_use]
    pub fn request_topic(&self) -> String {
        format!("device/{}/request", self.printer.serial)
    }

    /// Broker address and TLS flags. Fails without a CA file: the clients
    /// verify the chain even with `--insecure`, so nothing else can connect.
    fn connection_args(&self) -> Result<Vec<String>> {
        let p = &self.printer;
        let ca = p.ca_file.as_ref().ok_or(BpError::MissingCredential {
            name: "BAMBU_CA_FILE",
        })?;
        let mut args = vec![
            "-h".to_string(),
            p.hostname.clone(),
            "-p".to_string(),
            p.port.to_string(),
            "--cafile".to_string(),
            ca.to_string_lossy().into_owned(),
        ];
        if p.tls_insecure {
            args.push("--insecure".to_string());
        }
        Ok(args)
    }

    /// Arguments for `mosquitto_sub`.
    pub fn subscribe_args(&self) -> Result<Vec<String>> {
        let mut args = self.connection_args()?;
        args.push("-t".to_string());
        args.push(self.report_topic());
        Ok(args)
    }

    /// Arguments for the one-shot `mosquitto_pub` full-state request.
    pub fn pushall_args(&self) -> Result<Vec<String>> {
        let mut args = self.connection_args()?;
        args.extend([
            "-t".to_string(),
            self.request_topic(),
            "-m".to_string(),
            PUSHALL_PAYLOAD.to_string(),
        ]);
        Ok(args)
    }

    /// Contents of the per-client options file: one option per line.
    fn credential_options(&self) -> String {
        format!(
            "-u {}\n-P {}\n",
            self.printer.username, self.printer.access_code
        )
    }

    /// Private (0700) directory holding the credential options for both clients.
    fn write_options(&self) -> Result<TempDir> {
        let dir = tempfile::Builder::new()
            .prefix("bambu-progress-")
            .tempdir()
            .map_err(|source| BpError::io(std::env::temp_dir(), source))?;
        let body = self.credential_options();
        for program in [SUB_PROGRAM, PUB_PROGRAM] {
            let path = dir.path().join(program);
            fs::write(&path, &body).map_err(|source| BpError::io(&path, source))?;
        }
        Ok(dir)
    }

    fn spawn_reader(
        &self,
        stdout: impl Read + Send + 'static,
        stderr: JoinHandle<Vec<String>>,
        sink: Sender<TelemetryEvent>,
    ) -> Result<JoinHandle<()>> {
        let child = Arc::clone(&self.sub_child);
        let mut pump = LinePump::new(sink, Arc::clone(&self.stop), SUB_PROGRAM);

        thread::Builder::new()
            .name("bp-mqtt-reader".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let keep_going = match line {
                        Ok(line) => pump.feed(&line),
                        Err(error) => {
                            tracing::warn!(%error, "mosquitto_sub output unreadable");
                            true
                        }
                    };
                    if !keep_going {
                        return;
                    }
                }
                let tail = stderr.join().unwrap_or_default();
                pump.close(reap_exit(&child, &tail));
            })
            .map_err(|source| BpError::Runtime {
                details: format!("failed to spawn mqtt reader thread: {source}"),
            })
    }

    fn spawn_pusher(&self, options_home: PathBuf) -> Result<JoinHandle<()>> {
        let args = self.pushall_args()?;
        let program = self.printer.pub_program.clone();
        let delay = Duration::from_millis(self.printer.full_state_delay_ms);
        let stop = Arc::clone(&self.stop);
        let slot = Arc::clone(&self.pub_child);
        let topic = self.request_topic();

        thread::Builder::new()
            .name("bp-mqtt-pushall".to_string())
            .spawn(move || {
                if !sleep_unless_stopped(delay, &stop) {
                    return;
                }
                let mut child = match Command::new(&program)
                    .args(&args)
                    .env(OPTIONS_ENV, &options_home)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::piped())
                    .spawn()
                {
                    Ok(child) => child,
                    Err(error) => {
                        tracing::warn!(%error, program = %program.display(), "could not run mosquitto_pub");
                        return;
                    }
                };
                let stderr = child
                    .stderr
                    .take()
                    .and_then(|pipe| drain_stderr(pipe, PUB_PROGRAM).ok());
                *slot.lock() = Some(child);

                let status = wait_unless_stopped(&slot, &stop);
                let tail = stderr
                    .and_then(|handle| handle.join().ok())
                    .unwrap_or_default();
                match status {
                    Some(status) if status.success() => {
                        tracing::debug!(topic = %topic, "full state requested");
                    }
                    Some(status) => tracing::warn!(
                        topic = %topic,
                        status = %status,
                        stderr = %tail.join(" | "),
                        "full state request failed"
                    ),
                    None => tracing::debug!(topic = %topic, "full state request abandoned"),
                }
            })
            .map_err(|source| BpError::Runtime {
                details: format!("failed to spawn pushall thread: {source}"),
            })
    }
}

/// Read a client's stderr until EOF so the child never blocks on a full
/// pipe. Every line goes to the log; the last few are returned.
fn drain_stderr(
    stderr: impl Read + Send + 'static,
    program: &'static str,
) -> Result<JoinHandle<Vec<String>>> {
    thread::Builder::new()
        .name("bp-mqtt-stderr".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let raw = String::from_utf8_lossy(&buf);
                let line: String = raw.trim().chars().take(STDERR_LINE_CHARS).collect();
                if line.is_empty() {
                    continue;
                }
                tracing::debug!(program, line = %line, "client stderr");
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into()
        })
        .map_err(|source| BpError::Runtime {
            details: format!("failed to spawn {program} stderr thread: {source}"),
        })
}

/// Poll the pushall child until it exits. The lock is only held per poll so
/// `unsubscribe` can take the child and kill it at any time.
fn wait_unless_stopped(slot: &Mutex<Option<Child>>, stop: &AtomicBool) -> Option<ExitStatus> {
    loop {
        {
            let mut guard = slot.lock();
            let child = guard.as_mut()?;
            if stop.load(Ordering::Relaxed) {
                let _ = child.kill();
                let _ = child.wait();
                *guard = None;
                return None;
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    *guard = None;
                    return Some(status);
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(%error, "mosquitto_pub could not be polled");
                    *guard = None;
                    return None;
                }
            }
        }
        thread::sleep(PUB_POLL);
    }
}

/// Kill and reap whatever child is left in `slot`.
fn kill_and_reap(slot: &Mutex<Option<Child>>, program: &'static str) {
    let taken = slot.lock().take();
    if let Some(mut child) = taken {
        if let Err(error) = child.kill() {
            tracing::debug!(program, %error, "client already exited");
        }
        let _ = child.wait();
    }
}

/// Wait for the exited subscriber and describe an abnormal exit.
fn reap_exit(child: &Mutex<Option<Child>>, stderr_tail: &[String]) -> Option<String> {
    let mut taken = child.lock().take()?;
    match taken.wait() {
        Ok(status) if status.success() => None,
        Ok(status) if stderr_tail.is_empty() => Some(format!("{SUB_PROGRAM} exited with {status}")),
        Ok(status) => Some(format!(
            "{SUB_PROGRAM} exited with {status}: {}",
            stderr_tail.join(" | ")
        )),
        Err(error) => Some(format!("{SUB_PROGRAM} could not be reaped: {error}")),
    }
}

impl TelemetrySource for MosquittoSource {
    fn subscribe(&mut self, sink: Sender<TelemetryEvent>) -> Result<()> {
        self.unsubscribe();
        self.stop.store(false, Ordering::Relaxed);

        let args = self.subscribe_args()?;
        let options = self.write_options()?;
        let mut child = Command::new(&self.printer.sub_program)
            .args(&args)
            .env(OPTIONS_ENV, options.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BpError::SourceSpawn {
                program: SUB_PROGRAM,
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BpError::Runtime {
                details: "mosquitto_sub output was not captured".to_string(),
            });
        };
        *self.sub_child.lock() = Some(child);

        let options_home = options.path().to_path_buf();
        self.options = Some(options);
        let drain = drain_stderr(stderr, SUB_PROGRAM)?;
        self.reader = Some(self.spawn_reader(stdout, drain, sink)?);
        self.pusher = Some(self.spawn_pusher(options_home)?);
        tracing::info!(
            host = %self.printer.hostname,
            port = self.printer.port,
            topic = %self.report_topic(),
            program = %self.printer.sub_program.display(),
            "mqtt subscriber started"
        );
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        kill_and_reap(&self.sub_child, SUB_PROGRAM);
        kill_and_reap(&self.pub_child, PUB_PROGRAM);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.pusher.take() {
            let _ = handle.join();
        }
        if let Some(options) = self.options.take() {
            remove_options(options);
        }
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.printer.hostname, self.printer.port)
    }
}

fn remove_options(options: TempDir) {
    let shown = options.path().display().to_string();
    if let Err(error) = options.close() {
        tracing::warn!(path = %shown, %error, "could not remove mqtt options directory");
    }
}

impl Drop for MosquittoSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
