//! Human-readable and structured assessment output
//!
//! [`render`] is deterministic for a given assessment apart from the
//! analysis timestamp line. [`StructuredAssessment`] is what a downstream
//! remediation tool reads instead of re-parsing text.

use crate::aggregate::{ComponentHealth, RunSelection};
use crate::assessment::SystemAssessment;
use crate::divergence::HealthDivergence;
use crate::error::Result;
use crate::health;
use crate::routing::{RestorationRouter, RouteProposal};
use crate::wire::format_delta;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

const RULE: &str = "════════════════════════════════════════════════════════════";

/// Components ordered worst health first, ties by name.
pub fn worst_first(assessment: &SystemAssessment) -> Vec<&ComponentHealth> {
    let mut components: Vec<&ComponentHealth> = assessment.components.values().collect();
    components.sort_by(|a, b| a.final_health.cmp(&b.final_health).then_with(|| a.name.cmp(&b.name)));
    components
}

/// Plain-text report.
pub fn render(assessment: &SystemAssessment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  Pulse Assessment Report");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out);

    let _ = writeln!(out, "System Overview");
    let _ = writeln!(out, "  Analysis Time: {}", assessment.analysis_time.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "  Components Analyzed: {}", assessment.components.len());
    let _ = writeln!(out, "  Total Entries: {}", assessment.total_entries);
    let _ = writeln!(out, "  Inspection Entries: {}", assessment.debug_entries);
    let _ = writeln!(out, "  Parse Errors: {}", assessment.parse_errors);
    let _ = writeln!(
        out,
        "  Overall Health: {} {}% {}",
        health::indicator(assessment.overall_health),
        assessment.overall_health,
        health::bar(assessment.overall_health)
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Component Health");
    for c in worst_first(assessment) {
        let _ = writeln!(
            out,
            "  {} {:<24} {:>4}%  checks {} | ok {} | fail {} | warn {} | err {}",
            health::indicator(c.final_health),
            c.name,
            c.final_health,
            c.check_count,
            c.success_count,
            c.failure_count,
            c.warning_count,
            c.error_count,
        );
        match &c.selection {
            RunSelection::AllRecords => {}
            RunSelection::LatestComplete { context_id } => {
                let _ = writeln!(out, "      run: {} (last completed)", context_id);
            }
            RunSelection::SecondMostRecent { context_id } => {
                let _ = writeln!(out, "      run: {} (no completed run found; second most recent)", context_id);
            }
        }
    }
    let _ = writeln!(out);

    section(&mut out, "Critical Issues", &assessment.critical_issues);
    section(&mut out, "Warnings", &assessment.warnings);

    let divergences: Vec<&HealthDivergence> = worst_first(assessment)
        .into_iter()
        .flat_map(|c| &c.divergences)
        .collect();
    if !divergences.is_empty() {
        let _ = writeln!(out, "Health Divergences ({})", divergences.len());
        for d in divergences {
            let _ = writeln!(
                out,
                "  [{}] {}::{} expected {} actual {} (gap {}) {}",
                d.severity,
                d.component,
                d.check_name,
                format_delta(d.expected),
                format_delta(d.actual),
                format_delta(d.gap),
                d.pattern,
            );
            if let Some(semantic) = &d.semantic {
                if let Some(error_type) = &semantic.error_type {
                    let _ = writeln!(out, "      error: {}", error_type);
                }
                if let Some(strategy) = &semantic.recovery_strategy {
                    let _ = writeln!(out, "      strategy: {}", strategy);
                }
            }
        }
        let _ = writeln!(out);
    }

    counts(&mut out, "Patterns", &assessment.patterns);
    counts(&mut out, "Divergence Summary", &assessment.divergence_summary);

    if !assessment.cross_component_issues.is_empty() {
        let _ = writeln!(out, "Cross-Component Issues");
        for (issue, affected) in &assessment.cross_component_issues {
            let _ = writeln!(out, "  {}: {}", issue, affected.join(", "));
        }
        let _ = writeln!(out);
    }

    section(&mut out, "Recommendations", &assessment.recommendations);
    out
}

fn section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{} ({})", title, items.len());
    for item in items {
        let _ = writeln!(out, "  - {}", item);
    }
    let _ = writeln!(out);
}

fn counts(out: &mut String, title: &str, map: &BTreeMap<String, usize>) {
    if map.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}", title);
    for (name, count) in map {
        let _ = writeln!(out, "  {}: {}", name, count);
    }
    let _ = writeln!(out);
}

/// Per-component numbers in the structured output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub final_health: i64,
    pub records: usize,
    pub checks: usize,
    pub successes: usize,
    pub failures: usize,
    pub warnings: usize,
    pub errors: usize,
    pub operations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
}

/// A divergence with the route proposed for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedDivergence {
    #[serde(flatten)]
    pub divergence: HealthDivergence,
    pub route: RouteProposal,
}

/// Machine-readable assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAssessment {
    pub generated_at: NaiveDateTime,
    pub overall_health: i64,
    pub total_entries: usize,
    pub parse_errors: usize,
    pub components: BTreeMap<String, ComponentSummary>,
    pub divergences: Vec<RoutedDivergence>,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub patterns: BTreeMap<String, usize>,
    pub cross_component_issues: BTreeMap<String, Vec<String>>,
    pub divergence_summary: BTreeMap<String, usize>,
}

impl StructuredAssessment {
    pub fn build(assessment: &SystemAssessment, router: &RestorationRouter) -> Self {
        let components = assessment
            .components
            .iter()
            .map(|(name, c)| {
                let summary = ComponentSummary {
                    final_health: c.final_health,
                    records: c.record_count(),
                    checks: c.check_count,
                    successes: c.success_count,
                    failures: c.failure_count,
                    warnings: c.warning_count,
                    errors: c.error_count,
                    operations: c.operation_count,
                    run: c.selection.context_id().map(str::to_string),
                };
                (name.clone(), summary)
            })
            .collect();

        let divergences = worst_first(assessment)
            .into_iter()
            .flat_map(|c| &c.divergences)
            .map(|d| RoutedDivergence {
                route: router.route(d),
                divergence: d.clone(),
            })
            .collect();

        Self {
            generated_at: assessment.analysis_time,
            overall_health: assessment.overall_health,
            total_entries: assessment.total_entries,
            parse_errors: assessment.parse_errors,
            components,
            divergences,
            critical_issues: assessment.critical_issues.clone(),
            warnings: assessment.warnings.clone(),
            recommendations: assessment.recommendations.clone(),
            patterns: assessment.patterns.clone(),
            cross_component_issues: assessment.cross_component_issues.clone(),
            divergence_summary: assessment.divergence_summary.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
