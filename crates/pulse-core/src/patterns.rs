//! Issue pattern classification and cross-component correlation

use crate::aggregate::ComponentHealth;
use crate::config::Thresholds;
use serde::Serialize;
use std::collections::BTreeMap;

pub const PERMISSION_ERROR: &str = "permission_error";
pub const MISSING_RESOURCE: &str = "missing_resource";
pub const CONFIG_ERROR: &str = "config_error";
pub const HIGH_FAILURE_RATE: &str = "high_failure_rate";
pub const CRITICAL_HEALTH: &str = "critical_health";
pub const HEALTH_DEGRADATION: &str = "health_degradation";
pub const WARNING_ACCUMULATION: &str = "warning_accumulation";
pub const DEGRADED_HEALTH: &str = "degraded_health";

/// Substrings looked for in critical issues, and the pattern each signals.
const CRITICAL_PATTERNS: &[(&[&str], &str)] = &[
    (&["permission", "denied"], PERMISSION_ERROR),
    (&["not found", "missing"], MISSING_RESOURCE),
    (&["syntax", "invalid"], CONFIG_ERROR),
    (&["failure rate exceeds"], HIGH_FAILURE_RATE),
    (&["critical health"], CRITICAL_HEALTH),
];

const WARNING_PATTERNS: &[(&[&str], &str)] = &[
    (&["negative health"], HEALTH_DEGRADATION),
    (&["multiple warnings"], WARNING_ACCUMULATION),
];

/// Count known patterns in issue text. Matching ignores case, and an issue
/// counts at most once per pattern.
pub fn identify_patterns(critical_issues: &[String], warnings: &[String]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    tally(&mut counts, critical_issues, CRITICAL_PATTERNS);
    tally(&mut counts, warnings, WARNING_PATTERNS);
    counts
}

fn tally(counts: &mut BTreeMap<String, usize>, issues: &[String], table: &[(&[&str], &str)]) {
    for issue in issues {
        let lowered = issue.to_lowercase();
        for (needles, pattern) in table {
            if needles.iter().any(|n| lowered.contains(n)) {
                *counts.entry(pattern.to_string()).or_default() += 1;
            }
        }
    }
}

/// Threshold classes a component falls into.
pub fn classify_component(health: &ComponentHealth, thresholds: &Thresholds) -> Vec<&'static str> {
    let mut classes = Vec::new();
    if health.final_health < thresholds.critical {
        classes.push(CRITICAL_HEALTH);
    } else if health.final_health < thresholds.degraded {
        classes.push(DEGRADED_HEALTH);
    }
    if health.failure_count > health.success_count {
        classes.push(HIGH_FAILURE_RATE);
    }
    if health.warning_count > thresholds.warning_count {
        classes.push(WARNING_ACCUMULATION);
    }
    classes
}

/// Issue class → components sharing it, names sorted.
pub fn correlate_across_components(
    components: &BTreeMap<String, ComponentHealth>,
    thresholds: &Thresholds,
) -> BTreeMap<String, Vec<String>> {
    let mut issues: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, health) in components {
        for class in classify_component(health, thresholds) {
            issues.entry(class.to_string()).or_default().push(name.clone());
        }
    }
    issues
}

/// Whether an issue class points at a shared cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueScope {
    Systemic,
    Local,
}

impl IssueScope {
    pub fn for_components(affected: &[String]) -> Self {
        if affected.len() > 1 {
            IssueScope::Systemic
        } else {
            IssueScope::Local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, final_health: i64, successes: usize, failures: usize, warnings: usize) -> ComponentHealth {
        ComponentHealth {
            name: name.to_string(),
            final_health,
            success_count: successes,
            failure_count: failures,
            warning_count: warnings,
            ..Default::default()
        }
    }

    #[test]
    fn test_patterns_match_generated_issue_text() {
        let critical = vec![
            "sudoers: Critical health (-55) - multiple failures detected".to_string(),
            "sudoers: Failure rate exceeds success rate (3 failures vs 1 successes)".to_string(),
            "build: permission denied on /usr/local/bin".to_string(),
        ];
        let warnings = vec![
            "status: Negative health (-4) - system degradation".to_string(),
            "status: Multiple warnings (7) - potential instability".to_string(),
        ];
        let patterns = identify_patterns(&critical, &warnings);
        assert_eq!(patterns[CRITICAL_HEALTH], 1);
        assert_eq!(patterns[HIGH_FAILURE_RATE], 1);
        assert_eq!(patterns[PERMISSION_ERROR], 1);
        assert_eq!(patterns[HEALTH_DEGRADATION], 1);
        assert_eq!(patterns[WARNING_ACCUMULATION], 1);
        assert!(!patterns.contains_key(MISSING_RESOURCE));
    }

    #[test]
    fn test_cross_component_grouping() {
        let thresholds = Thresholds::default();
        let mut components = BTreeMap::new();
        for c in [
            component("a", -50, 0, 2, 0),
            component("b", -40, 1, 3, 6),
            component("c", -10, 2, 1, 0),
            component("d", 80, 5, 0, 0),
        ] {
            components.insert(c.name.clone(), c);
        }

        let issues = correlate_across_components(&components, &thresholds);
        assert_eq!(issues[CRITICAL_HEALTH], vec!["a", "b"]);
        assert_eq!(issues[DEGRADED_HEALTH], vec!["c"]);
        assert_eq!(issues[HIGH_FAILURE_RATE], vec!["a", "b"]);
        assert_eq!(issues[WARNING_ACCUMULATION], vec!["b"]);
        assert_eq!(IssueScope::for_components(&issues[CRITICAL_HEALTH]), IssueScope::Systemic);
        assert_eq!(IssueScope::for_components(&issues[DEGRADED_HEALTH]), IssueScope::Local);
    }
}
