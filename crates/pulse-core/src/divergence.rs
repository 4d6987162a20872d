//! Expected vs observed health impact
//!
//! Each component declares what its named checks should contribute. A
//! divergence is any scored record whose observed impact differs from that
//! declaration. Two negative values are not compared: a check that was
//! planned as a loss and lost differently is not reported.

use crate::config::ExpectedHealthMap;
use crate::record::{Level, LogRecord, SemanticMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far off a divergence is, by absolute gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<5` low, `5..=9` medium, `10..=19` high, `>=20` critical.
pub fn severity_for_gap(gap: i64) -> Severity {
    match gap.unsigned_abs() {
        0..=4 => Severity::Low,
        5..=9 => Severity::Medium,
        10..=19 => Severity::High,
        _ => Severity::Critical,
    }
}

/// Shape of a divergence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DivergencePattern {
    CompleteFailure,
    PartialSuccess,
    UnexpectedFailure,
    OverPerformance,
    Unknown,
}

impl DivergencePattern {
    pub fn as_str(self) -> &'static str {
        match self {
            DivergencePattern::CompleteFailure => "complete-failure",
            DivergencePattern::PartialSuccess => "partial-success",
            DivergencePattern::UnexpectedFailure => "unexpected-failure",
            DivergencePattern::OverPerformance => "over-performance",
            DivergencePattern::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DivergencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an `(expected, actual)` pair. `None` means no divergence.
pub fn classify(expected: i64, actual: i64) -> Option<DivergencePattern> {
    if expected == actual || (expected < 0 && actual < 0) {
        return None;
    }
    let pattern = if actual == 0 && expected > 0 {
        DivergencePattern::CompleteFailure
    } else if actual > 0 && actual < expected {
        DivergencePattern::PartialSuccess
    } else if actual < 0 && expected > 0 {
        DivergencePattern::UnexpectedFailure
    } else if actual > expected {
        DivergencePattern::OverPerformance
    } else {
        DivergencePattern::Unknown
    };
    Some(pattern)
}

/// One check whose observed impact differs from its declared impact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthDivergence {
    pub component: String,
    pub check_name: String,
    pub context_id: String,
    pub level: Level,
    pub expected: i64,
    pub actual: i64,
    /// `actual - expected`
    pub gap: i64,
    pub severity: Severity,
    pub pattern: DivergencePattern,
    /// Routing metadata carried over from the originating record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticMetadata>,
}

impl HealthDivergence {
    /// Whether the emitting code attached anything a router can use.
    pub fn is_routable(&self) -> bool {
        self.semantic
            .as_ref()
            .map(|s| s.error_type.is_some() || s.recovery_strategy.is_some() || s.recovery_hint.is_some())
            .unwrap_or(false)
    }
}

/// Compare every CHECK/SUCCESS/FAILURE record against the expected map.
pub fn detect_divergences(component: &str, records: &[LogRecord], expected: &ExpectedHealthMap) -> Vec<HealthDivergence> {
    if expected.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|r| r.level.is_scored_check())
        .filter_map(|record| {
            let name = record.check_name();
            let &want = expected.get(name)?;
            let actual = record.health_impact;
            let pattern = classify(want, actual)?;
            let gap = actual.saturating_sub(want);
            Some(HealthDivergence {
                component: component.to_string(),
                check_name: name.to_string(),
                context_id: record.context_id.clone(),
                level: record.level,
                expected: want,
                actual,
                gap,
                severity: severity_for_gap(gap),
                pattern,
                semantic: record.semantic.clone(),
            })
        })
        .collect()
}
