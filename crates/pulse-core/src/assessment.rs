//! System assessment
//!
//! The pipeline is linear: read files, parse, correlate, aggregate per
//! component, detect divergences, classify patterns, correlate across
//! components. Every stage accepts partial input; only the absence of any
//! log file is reported as an error.

use crate::aggregate::{aggregate, select_completed_run, ComponentHealth};
use crate::config::{PulseConfig, Thresholds};
use crate::correlate::{correlate, CorrelatedContext};
use crate::divergence::detect_divergences;
use crate::error::{PulseError, Result};
use crate::parser::{parse_debug_file, parse_log_file, ParseOutcome};
use crate::paths;
use crate::patterns::{correlate_across_components, identify_patterns, IssueScope};
use crate::record::{InspectionRecord, LogRecord};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

pub const UNEXPECTED_DEGRADATION: &str = "unexpected_degradation";
pub const INCOMPLETE_RECOVERY: &str = "incomplete_recovery";
pub const INCONSISTENT_SCORING: &str = "inconsistent_scoring";

/// More checks than this with a final health of exactly zero looks unscored.
const UNSCORED_CHECK_COUNT: usize = 10;

/// Everything one analysis run derived
#[derive(Debug, Clone, Serialize)]
pub struct SystemAssessment {
    pub analysis_time: NaiveDateTime,
    pub components: BTreeMap<String, ComponentHealth>,
    /// Mean of component final healths, truncated
    pub overall_health: i64,
    pub total_entries: usize,
    pub parse_errors: usize,
    pub debug_entries: usize,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub patterns: BTreeMap<String, usize>,
    pub cross_component_issues: BTreeMap<String, Vec<String>>,
    pub divergence_summary: BTreeMap<String, usize>,
    #[serde(skip)]
    pub correlated: BTreeMap<String, CorrelatedContext>,
}

impl SystemAssessment {
    pub fn has_critical_issues(&self) -> bool {
        !self.critical_issues.is_empty()
    }

    pub fn divergence_count(&self) -> usize {
        self.components.values().map(|c| c.divergences.len()).sum()
    }

    /// Contexts where both streams contributed.
    pub fn joined_contexts(&self) -> usize {
        self.correlated.values().filter(|c| c.is_joined()).count()
    }
}

/// Build the assessment from aggregated components.
pub fn assess(components: BTreeMap<String, ComponentHealth>, thresholds: &Thresholds) -> SystemAssessment {
    let mut critical_issues = Vec::new();
    let mut warnings = Vec::new();
    let mut total_health = 0i64;

    for (name, c) in &components {
        if c.final_health < thresholds.critical {
            critical_issues.push(format!(
                "{}: Critical health ({}) - multiple failures detected",
                name, c.final_health
            ));
        } else if c.final_health < thresholds.degraded {
            warnings.push(format!(
                "{}: Negative health ({}) - system degradation",
                name, c.final_health
            ));
        }
        if c.failure_count > c.success_count {
            critical_issues.push(format!(
                "{}: Failure rate exceeds success rate ({} failures vs {} successes)",
                name, c.failure_count, c.success_count
            ));
        }
        if c.warning_count > thresholds.warning_count {
            warnings.push(format!(
                "{}: Multiple warnings ({}) - potential instability",
                name, c.warning_count
            ));
        }
        total_health += c.final_health;
    }

    let overall_health = if components.is_empty() {
        0
    } else {
        total_health / components.len() as i64
    };

    let patterns = identify_patterns(&critical_issues, &warnings);
    let cross_component_issues = correlate_across_components(&components, thresholds);
    let divergence_summary = divergence_summary(&components, thresholds);
    let recommendations = recommendations(
        &components,
        overall_health,
        thresholds,
        !critical_issues.is_empty(),
        &cross_component_issues,
    );

    SystemAssessment {
        analysis_time: chrono::Local::now().naive_local(),
        total_entries: components.values().map(|c| c.record_count()).sum(),
        components,
        overall_health,
        parse_errors: 0,
        debug_entries: 0,
        critical_issues,
        warnings,
        recommendations,
        patterns,
        cross_component_issues,
        divergence_summary,
        correlated: BTreeMap::new(),
    }
}

/// Divergence pattern counts plus behavioral heuristics per component.
pub fn divergence_summary(components: &BTreeMap<String, ComponentHealth>, thresholds: &Thresholds) -> BTreeMap<String, usize> {
    let mut summary: BTreeMap<String, usize> = BTreeMap::new();
    for c in components.values() {
        for d in &c.divergences {
            *summary.entry(d.pattern.as_str().to_string()).or_default() += 1;
        }
        if c.final_health < 0 && c.success_count > c.failure_count {
            *summary.entry(UNEXPECTED_DEGRADATION.to_string()).or_default() += 1;
        }
        if c.failure_count > 0 && c.success_count > c.failure_count && c.final_health < thresholds.warning {
            *summary.entry(INCOMPLETE_RECOVERY.to_string()).or_default() += 1;
        }
        if c.check_count > UNSCORED_CHECK_COUNT && c.final_health == 0 {
            *summary.entry(INCONSISTENT_SCORING.to_string()).or_default() += 1;
        }
    }
    summary
}

fn recommendations(
    components: &BTreeMap<String, ComponentHealth>,
    overall_health: i64,
    thresholds: &Thresholds,
    has_critical: bool,
    cross_component: &BTreeMap<String, Vec<String>>,
) -> Vec<String> {
    let mut out = Vec::new();
    if has_critical {
        out.push("Run 'diagnose' for detailed troubleshooting of critical issues".to_string());
    }
    if overall_health < thresholds.degraded {
        out.push("System health is negative - review component logs for failure patterns".to_string());
    } else if overall_health < thresholds.warning {
        out.push("System health is degraded - consider running 'validate' to check configuration".to_string());
    }

    for (issue, affected) in cross_component {
        if IssueScope::for_components(affected) == IssueScope::Systemic {
            out.push(format!(
                "'{}' affects {} components ({}) - look for a shared root cause",
                issue,
                affected.len(),
                affected.join(", ")
            ));
        }
    }

    let routable = components
        .values()
        .flat_map(|c| &c.divergences)
        .filter(|d| d.is_routable())
        .count();
    if routable > 0 {
        out.push(format!(
            "{} divergence(s) carry routing metadata - see the structured assessment for restoration routes",
            routable
        ));
    }
    out
}

/// Batch analysis over everything under the configured base directory
#[derive(Debug, Clone)]
pub struct Analyzer<'a> {
    config: &'a PulseConfig,
    component: Option<String>,
    self_run: Option<(String, String)>,
}

impl<'a> Analyzer<'a> {
    pub fn new(config: &'a PulseConfig) -> Self {
        Self {
            config,
            component: None,
            self_run: None,
        }
    }

    /// Restrict analysis to one component.
    pub fn with_component(mut self, component: Option<String>) -> Self {
        self.component = component;
        self
    }

    /// Declare the analyzing process's own component and running context.
    ///
    /// That component's log is reduced to its last completed run.
    pub fn with_self_run(mut self, component: impl Into<String>, context_id: impl Into<String>) -> Self {
        self.self_run = Some((component.into(), context_id.into()));
        self
    }

    pub fn run(&self) -> Result<SystemAssessment> {
        let log_files = paths::discover_log_files(self.config)?;
        let mut logs: ParseOutcome<LogRecord> = ParseOutcome::default();
        for path in &log_files {
            match parse_log_file(path) {
                Ok(outcome) => logs.merge(outcome),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable log file"),
            }
        }

        // Right after a rotation the previous runs of the analyzing component
        // live only in the newest rotated file.
        let mut rotated: Vec<LogRecord> = Vec::new();
        if let Some((own, _)) = &self.self_run {
            if let Some(path) = paths::newest_rotation(&paths::log_path(self.config, own)) {
                match parse_log_file(&path) {
                    Ok(outcome) => {
                        logs.errors += outcome.errors;
                        rotated = outcome.records.into_iter().filter(|r| r.component == *own).collect();
                    }
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable rotated log"),
                }
            }
        }

        let is_running = |record: &LogRecord| match &self.self_run {
            Some((own, current)) => record.component == *own && record.context_id == *current,
            None => false,
        };
        if self.self_run.is_some() && logs.records.iter().chain(&rotated).all(is_running) {
            return Err(PulseError::NoLogFiles(self.config.logs_dir()));
        }

        let mut debugs: ParseOutcome<InspectionRecord> = ParseOutcome::default();
        for path in paths::discover_debug_files(self.config) {
            match parse_debug_file(&path) {
                Ok(outcome) => debugs.merge(outcome),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable debug file"),
            }
        }

        let wanted = |component: &str| self.component.as_deref().map_or(true, |c| c == component);
        let log_records: Vec<LogRecord> = rotated
            .into_iter()
            .chain(logs.records)
            .filter(|r| wanted(&r.component))
            .collect();
        let inspections: Vec<InspectionRecord> = debugs
            .records
            .into_iter()
            .filter(|r| wanted(&r.component))
            .collect();

        let correlated = correlate(&log_records, &inspections);

        let mut by_component: BTreeMap<String, Vec<LogRecord>> = BTreeMap::new();
        for record in log_records {
            by_component.entry(record.component.clone()).or_default().push(record);
        }

        let mut components = BTreeMap::new();
        for (name, records) in by_component {
            let (records, selection) = match &self.self_run {
                Some((own, current)) if *own == name => select_completed_run(records, Some(current.as_str())),
                _ => (records, Default::default()),
            };
            if records.is_empty() {
                continue;
            }
            let mut health = aggregate(&name, records);
            health.selection = selection;
            health.divergences = detect_divergences(&name, &health.records, &self.config.expected_for(&name));
            components.insert(name, health);
        }

        let mut assessment = assess(components, &self.config.thresholds);
        assessment.parse_errors = logs.errors + debugs.errors;
        assessment.debug_entries = inspections.len();
        assessment.correlated = correlated;
        tracing::debug!(
            files = log_files.len(),
            components = assessment.components.len(),
            entries = assessment.total_entries,
            parse_errors = assessment.parse_errors,
            "analysis complete"
        );
        Ok(assessment)
    }
}
