//! Health-scored event emitter
//!
//! One [`Emitter`] per running component. Every call appends exactly one
//! block to the component's log file and updates the running session
//! health. Emission never fails observably: write problems are reported
//! through `tracing` and the caller carries on.
//!
//! ```no_run
//! use pulse_core::{details, Emitter, PulseConfig};
//!
//! let config = PulseConfig::default();
//! let mut emitter = Emitter::new("validate", &config);
//! emitter.declare_health_total(47);
//! emitter.check("file-exists", true, 10, details! { "path" => "/etc/hosts" });
//! emitter.check("syntax-ok", true, 30, details! {});
//! emitter.success("done", 7, details! {});
//! assert_eq!(emitter.normalized_health(), 100);
//! ```

use crate::config::{ContextCaptureSettings, PulseConfig, RotationSettings};
use crate::context::{ProcessIdentity, SystemContext};
use crate::error::Result;
use crate::health;
use crate::paths;
use crate::record::{Details, Level, LogRecord, SemanticMetadata};
use crate::wire::{self, CHECK_EVENT_PREFIX};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const COMMAND_START_IMPACT: i64 = 0;
const COMMAND_SUCCESS_IMPACT: i64 = 10;
const COMMAND_FAILURE_IMPACT: i64 = -10;

/// Context id for a fresh run: `component-pid-unixnanos`.
pub fn new_context_id(component: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}-{}-{}", component, std::process::id(), nanos)
}

/// Writer of one component's health-scored log stream
#[derive(Debug)]
pub struct Emitter {
    component: String,
    context_id: String,
    identity: ProcessIdentity,
    log_path: PathBuf,
    rotation: RotationSettings,
    capture: ContextCaptureSettings,
    session_health: i64,
    declared_total: i64,
    write_failures: usize,
}

impl Emitter {
    /// Create an emitter writing to the component's routed log file.
    pub fn new(component: impl Into<String>, config: &PulseConfig) -> Self {
        let component = component.into();
        let log_path = paths::log_path(config, &component);
        Self {
            context_id: new_context_id(&component),
            identity: ProcessIdentity::current(),
            log_path,
            rotation: config.rotation.clone(),
            capture: config.context_capture.clone(),
            session_health: 0,
            declared_total: 0,
            write_failures: 0,
            component,
        }
    }

    /// Share a context id with other writers of the same run.
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = context_id.into();
        self
    }

    /// Write to an explicit file instead of the routed location.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Sum a fully successful run of this component would reach.
    pub fn declare_health_total(&mut self, total: i64) {
        self.declared_total = total;
    }

    pub fn declared_total(&self) -> i64 {
        self.declared_total
    }

    /// Raw running sum of impacts.
    pub fn session_health(&self) -> i64 {
        self.session_health
    }

    pub fn normalized_health(&self) -> i64 {
        health::normalize(self.session_health, self.declared_total)
    }

    /// Writes that could not be completed so far.
    pub fn write_failures(&self) -> usize {
        self.write_failures
    }

    /// Start of an operation. Stores the full command line.
    pub fn operation(&mut self, command: &str, impact: i64, args: &[&str]) {
        let full = command_line(command, args);
        self.emit(
            Level::Operation,
            format!("Starting operation: {}", command),
            impact,
            crate::details! { "command" => full },
            None,
        );
    }

    pub fn success(&mut self, event: &str, impact: i64, details: Details) {
        self.emit(Level::Success, event.to_string(), impact, details, None);
    }

    pub fn success_with_semantic(&mut self, event: &str, impact: i64, details: Details, semantic: SemanticMetadata) {
        self.emit(Level::Success, event.to_string(), impact, details, Some(semantic));
    }

    pub fn failure(&mut self, event: &str, reason: &str, impact: i64, details: Details) {
        let details = with_entry(details, "reason", Value::from(reason));
        self.emit(Level::Failure, event.to_string(), impact, details, None);
    }

    pub fn failure_with_semantic(
        &mut self,
        event: &str,
        reason: &str,
        impact: i64,
        details: Details,
        semantic: SemanticMetadata,
    ) {
        let details = with_entry(details, "reason", Value::from(reason));
        self.emit(Level::Failure, event.to_string(), impact, details, Some(semantic));
    }

    /// Unexpected error. Records the message, its source chain and, when
    /// `RUST_BACKTRACE` enables it, a backtrace.
    pub fn error(&mut self, event: &str, err: &dyn std::error::Error, impact: i64) {
        let mut details = crate::details! { "error" => err.to_string() };
        let chain: Vec<String> = std::iter::successors(err.source(), |e| e.source())
            .map(|e| e.to_string())
            .collect();
        if !chain.is_empty() {
            details.insert("caused_by".to_string(), Value::from(chain));
        }
        let backtrace = std::backtrace::Backtrace::capture();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            details.insert("backtrace".to_string(), Value::from(backtrace.to_string()));
        }
        self.emit(Level::Error, event.to_string(), impact, details, None);
    }

    pub fn warning(&mut self, event: &str, impact: i64, details: Details) {
        self.emit(Level::Warning, event.to_string(), impact, details, None);
    }

    /// Validation step. The event reads `Checking: <what>`.
    pub fn check(&mut self, what: &str, result: bool, impact: i64, details: Details) {
        let details = with_entry(details, "result", Value::from(result));
        self.emit(Level::Check, check_event(what), impact, details, None);
    }

    pub fn check_with_semantic(
        &mut self,
        what: &str,
        result: bool,
        impact: i64,
        details: Details,
        semantic: SemanticMetadata,
    ) {
        let details = with_entry(details, "result", Value::from(result));
        self.emit(Level::Check, check_event(what), impact, details, Some(semantic));
    }

    /// Record the full system context at a notable moment.
    pub fn snapshot_state(&mut self, label: &str, impact: i64) {
        self.emit(
            Level::Context,
            format!("System state snapshot: {}", label),
            impact,
            Details::new(),
            None,
        );
    }

    pub fn debug(&mut self, event: &str, impact: i64, state: Details) {
        self.emit(Level::Debug, event.to_string(), impact, state, None);
    }

    /// Run a process, bracketing it with OPERATION and SUCCESS/FAILURE records.
    ///
    /// Returns the exit code; `-1` when the process ended without one. Only a
    /// failure to spawn is an error, and it is also recorded as a FAILURE.
    pub fn run_command(&mut self, command: &str, args: &[&str]) -> Result<i32> {
        self.operation(command, COMMAND_START_IMPACT, args);
        let started = Instant::now();
        let output = match Command::new(command).args(args).output() {
            Ok(output) => output,
            Err(e) => {
                self.failure(
                    &format!("Command failed: {}", command),
                    &e.to_string(),
                    COMMAND_FAILURE_IMPACT,
                    crate::details! { "command" => command_line(command, args) },
                );
                return Err(e.into());
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let details = crate::details! {
            "command" => command_line(command, args),
            "exit_code" => exit_code,
            "duration_ms" => started.elapsed().as_millis() as u64,
            "output" => combined,
        };

        if output.status.success() {
            self.success(&format!("Command completed: {}", command), COMMAND_SUCCESS_IMPACT, details);
        } else {
            self.failure(
                &format!("Command failed: {}", command),
                &format!("exit code: {}", exit_code),
                COMMAND_FAILURE_IMPACT,
                details,
            );
        }
        Ok(exit_code)
    }

    fn emit(
        &mut self,
        level: Level,
        event: String,
        impact: i64,
        details: Details,
        semantic: Option<SemanticMetadata>,
    ) {
        self.session_health = self.session_health.saturating_add(impact);
        let context = self
            .capture
            .is_full(level)
            .then(|| SystemContext::capture(&self.identity, &self.capture.env_prefix).to_map());

        let record = LogRecord {
            timestamp: chrono::Local::now().naive_local(),
            level,
            component: self.component.clone(),
            identity: self.identity.to_string(),
            context_id: self.context_id.clone(),
            event,
            raw_health: self.session_health,
            normalized_health: self.normalized_health(),
            health_impact: impact,
            context,
            details,
            semantic: semantic.filter(|s| !s.is_empty()),
        };
        self.write(&wire::format_log_record(&record));
    }

    fn write(&mut self, block: &str) {
        if let Err(e) = paths::rotate_if_needed(&self.log_path, &self.rotation) {
            tracing::warn!(path = %self.log_path.display(), error = %e, "log rotation failed");
        }
        if let Err(e) = paths::append_block(&self.log_path, block) {
            self.write_failures += 1;
            if self.write_failures == 1 {
                tracing::warn!(
                    component = %self.component,
                    path = %self.log_path.display(),
                    error = %e,
                    "cannot write log record; continuing without it"
                );
            }
        }
    }
}

fn check_event(what: &str) -> String {
    format!("{}{}", CHECK_EVENT_PREFIX, what)
}

fn command_line(command: &str, args: &[&str]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

fn with_entry(mut details: Details, key: &str, value: Value) -> Details {
    details.insert(key.to_string(), value);
    details
}
