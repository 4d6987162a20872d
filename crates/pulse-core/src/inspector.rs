//! State-contract inspector
//!
//! Records HOW a run behaved (expected vs actual state, timings, counts,
//! branches taken) into a per-session `.debug` file, keyed by the same
//! context id as the emitter stream. Inspectors start disabled; enabling one
//! never changes what the emitter writes.

use crate::config::PulseConfig;
use crate::context::{ProcessIdentity, SystemContext};
use crate::emitter::Emitter;
use crate::error::{PulseError, Result};
use crate::paths;
use crate::record::{Details, InspectionKind, InspectionRecord};
use crate::wire;
use serde::Serialize;
use serde_json::Value;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Writer of one component's inspection stream
#[derive(Debug)]
pub struct Inspector {
    component: String,
    context_id: String,
    identity: ProcessIdentity,
    env_prefix: String,
    session_dir: PathBuf,
    extension: String,
    file: Option<PathBuf>,
    path_override: Option<PathBuf>,
}

impl Inspector {
    /// Create a disabled inspector. The context id is the join key with the
    /// emitter stream and must not be empty.
    pub fn new(component: impl Into<String>, context_id: impl Into<String>, config: &PulseConfig) -> Result<Self> {
        let component = component.into();
        let context_id = context_id.into();
        if component.trim().is_empty() {
            return Err(PulseError::InvalidInput("empty component name".to_string()));
        }
        if context_id.trim().is_empty() {
            return Err(PulseError::InvalidInput(format!(
                "inspector for '{}' needs a context id",
                component
            )));
        }
        Ok(Self {
            session_dir: paths::debug_dir(config, &component),
            extension: config.paths.debug_extension.clone(),
            identity: ProcessIdentity::current(),
            env_prefix: config.context_capture.env_prefix.clone(),
            file: None,
            path_override: None,
            component,
            context_id,
        })
    }

    /// Inspector sharing an emitter's component and context id.
    pub fn for_emitter(emitter: &Emitter, config: &PulseConfig) -> Result<Self> {
        Self::new(emitter.component(), emitter.context_id(), config)
    }

    /// Write the session to an explicit file instead of a fresh one.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path_override = Some(path.into());
        self
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Current session file, once enabled.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Open the session file and write its banner. Enabling twice is a no-op.
    pub fn enable(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let now = chrono::Local::now();
        let path = match &self.path_override {
            Some(path) => path.clone(),
            None => self.session_dir.join(format!(
                "{}-{}{}",
                self.component,
                now.timestamp(),
                self.extension
            )),
        };
        let banner = wire::format_session_banner(
            &self.component,
            &self.context_id,
            self.identity.pid,
            &now.naive_local(),
        );
        paths::append_block(&path, &banner)?;
        tracing::debug!(component = %self.component, path = %path.display(), "inspection enabled");
        self.file = Some(path);
        Ok(())
    }

    /// Stop writing. Later calls are no-ops until re-enabled.
    pub fn disable(&mut self) {
        self.file = None;
    }

    #[track_caller]
    pub fn snapshot(&self, label: &str, state: Details) {
        self.write(InspectionKind::Snapshot, label, None, None, state, Location::caller());
    }

    /// Record an expected and an actual value side by side.
    ///
    /// The kind reads DIVERGENCE when they differ, but consumers compare the
    /// stored values themselves.
    #[track_caller]
    pub fn expected_state<E: Serialize, A: Serialize>(&self, label: &str, expected: &E, actual: &A, state: Details) {
        let (expected, actual) = (to_value(expected), to_value(actual));
        let kind = if expected == actual {
            InspectionKind::ExpectedState
        } else {
            InspectionKind::Divergence
        };
        self.write(kind, label, Some(expected), Some(actual), state, Location::caller());
    }

    /// Snapshot only when `condition` holds.
    #[track_caller]
    pub fn conditional_snapshot(&self, label: &str, condition: bool, mut state: Details) {
        if !condition {
            return;
        }
        state.insert("condition_met".to_string(), Value::Bool(true));
        self.write(InspectionKind::Conditional, label, None, None, state, Location::caller());
    }

    /// Duration against a budget; SLOW_TIMING when over it.
    #[track_caller]
    pub fn timing(&self, label: &str, elapsed: Duration, budget: Duration) {
        let elapsed_ms = elapsed.as_millis() as i64;
        let budget_ms = budget.as_millis() as i64;
        let kind = if elapsed > budget {
            InspectionKind::SlowTiming
        } else {
            InspectionKind::Timing
        };
        let state = crate::details! {
            "variance_ms" => elapsed_ms - budget_ms,
            "within_expected" => elapsed <= budget,
        };
        self.write(
            kind,
            label,
            Some(Value::from(budget_ms)),
            Some(Value::from(elapsed_ms)),
            state,
            Location::caller(),
        );
    }

    /// Execution count against an expected count.
    #[track_caller]
    pub fn counter(&self, label: &str, count: i64, expected: i64) {
        let kind = if count == expected {
            InspectionKind::Counter
        } else {
            InspectionKind::CountDivergence
        };
        let state = crate::details! { "variance" => count - expected };
        self.write(
            kind,
            label,
            Some(Value::from(expected)),
            Some(Value::from(count)),
            state,
            Location::caller(),
        );
    }

    #[track_caller]
    pub fn checkpoint(&self, label: &str, state: Details) {
        self.write(InspectionKind::Checkpoint, label, None, None, state, Location::caller());
    }

    /// Branch taken, optionally against the branch that should have been.
    #[track_caller]
    pub fn flow(&self, label: &str, branch: &str, expected: Option<&str>) {
        let state = crate::details! { "branch_taken" => branch };
        let (kind, expected) = match expected.filter(|e| !e.is_empty()) {
            Some(e) if e != branch => (InspectionKind::UnexpectedFlow, Some(Value::from(e))),
            Some(e) => (InspectionKind::Flow, Some(Value::from(e))),
            None => (InspectionKind::Flow, None),
        };
        let actual = expected.as_ref().map(|_| Value::from(branch));
        self.write(kind, label, expected, actual, state, Location::caller());
    }

    /// Process environment at this point.
    #[track_caller]
    pub fn system_context(&self, label: &str) {
        if !self.is_enabled() {
            return;
        }
        let state = SystemContext::capture(&self.identity, &self.env_prefix)
            .to_map()
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        self.write(InspectionKind::SystemContext, label, None, None, state, Location::caller());
    }

    fn write(
        &self,
        kind: InspectionKind,
        label: &str,
        expected: Option<Value>,
        actual: Option<Value>,
        details: Details,
        caller: &Location<'_>,
    ) {
        let Some(path) = &self.file else {
            return;
        };
        let record = InspectionRecord {
            timestamp: chrono::Local::now().naive_local(),
            kind,
            component: self.component.clone(),
            identity: self.identity.to_string(),
            context_id: self.context_id.clone(),
            label: label.to_string(),
            call_site: Some(format!("{}:{}", caller.file(), caller.line())),
            expected,
            actual,
            details,
        };
        if let Err(e) = paths::append_block(path, &wire::format_inspection_record(&record)) {
            tracing::warn!(path = %path.display(), error = %e, "cannot write inspection record");
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| Value::String(format!("<unserializable: {}>", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_debug_file;

    fn setup(dir: &Path) -> (PulseConfig, Inspector) {
        let config = PulseConfig::default().with_base_dir(dir);
        let inspector = Inspector::new("validate", "validate-1-1", &config).unwrap();
        (config, inspector)
    }

    #[test]
    fn test_context_id_is_required() {
        let config = PulseConfig::default();
        let err = Inspector::new("validate", "  ", &config).unwrap_err();
        assert!(matches!(err, PulseError::InvalidInput(_)));
    }

    #[test]
    fn test_disabled_inspector_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (config, inspector) = setup(dir.path());
        inspector.snapshot("ignored", Details::new());
        assert!(paths::discover_debug_files(&config).is_empty());
    }

    #[test]
    fn test_records_are_keyed_and_located() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mut inspector) = setup(dir.path());
        inspector.enable().unwrap();
        inspector.expected_state("entries", &3, &2, crate::details! { "file" => "a.log" });
        inspector.counter("retries", 1, 1);
        inspector.flow("mode", "fallback", Some("primary"));
        inspector.timing("parse", Duration::from_millis(20), Duration::from_millis(5));
        inspector.conditional_snapshot("never", false, Details::new());

        let files = paths::discover_debug_files(&config);
        assert_eq!(files.len(), 1);
        let outcome = parse_debug_file(&files[0]).unwrap();
        assert_eq!(outcome.errors, 0);

        let kinds: Vec<InspectionKind> = outcome.records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InspectionKind::Divergence,
                InspectionKind::Counter,
                InspectionKind::UnexpectedFlow,
                InspectionKind::SlowTiming,
            ]
        );
        assert!(outcome.records.iter().all(|r| r.context_id == "validate-1-1"));
        assert_eq!(outcome.records[0].matches(), Some(false));
        let site = outcome.records[0].call_site.as_deref().unwrap();
        assert!(site.contains("inspector.rs:"), "call site was {}", site);
    }

    #[test]
    fn test_bound_to_emitter_context() {
        let dir = tempfile::tempdir().unwrap();
        let config = PulseConfig::default().with_base_dir(dir.path());
        let emitter = Emitter::new("validate", &config);
        let inspector = Inspector::for_emitter(&emitter, &config).unwrap();
        assert_eq!(inspector.context_id(), emitter.context_id());
        assert!(!inspector.is_enabled());
    }
}
