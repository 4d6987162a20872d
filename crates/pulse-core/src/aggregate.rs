//! Per-component health folding
//!
//! Records are walked in file order. The final health is whatever the
//! emitter wrote into the last record; it is never recomputed here.

use crate::divergence::HealthDivergence;
use crate::record::{Level, LogRecord};
use chrono::NaiveDateTime;
use serde::Serialize;

/// One step of a component's health trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthPoint {
    pub timestamp: NaiveDateTime,
    pub level: Level,
    pub event: String,
    pub impact: i64,
    pub health: i64,
}

/// Derived health state of one component for one analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    #[serde(skip)]
    pub records: Vec<LogRecord>,
    pub final_health: i64,
    pub check_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub operation_count: usize,
    pub history: Vec<HealthPoint>,
    pub divergences: Vec<HealthDivergence>,
    /// Which records were kept when a single run was selected
    pub selection: RunSelection,
}

impl ComponentHealth {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Context ids present in the aggregated records, in first-seen order.
    pub fn context_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for record in &self.records {
            if !ids.contains(&record.context_id.as_str()) {
                ids.push(&record.context_id);
            }
        }
        ids
    }
}

/// Fold a component's records into counters, history and final health.
pub fn aggregate(component: &str, records: Vec<LogRecord>) -> ComponentHealth {
    let mut health = ComponentHealth {
        name: component.to_string(),
        ..Default::default()
    };

    for record in &records {
        match record.level {
            Level::Check => health.check_count += 1,
            Level::Success => health.success_count += 1,
            Level::Failure => health.failure_count += 1,
            Level::Warning => health.warning_count += 1,
            Level::Error => health.error_count += 1,
            Level::Operation => health.operation_count += 1,
            Level::Context | Level::Debug => {}
        }
        health.history.push(HealthPoint {
            timestamp: record.timestamp,
            level: record.level,
            event: record.event.clone(),
            impact: record.health_impact,
            health: record.normalized_health,
        });
    }

    health.final_health = records.last().map(|r| r.normalized_health).unwrap_or(0);
    health.records = records;
    health
}

/// How the run under analysis was chosen from a self-written log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RunSelection {
    /// No selection: every record was aggregated
    #[default]
    AllRecords,
    /// Most recent run that ended in SUCCESS or FAILURE
    LatestComplete { context_id: String },
    /// No run looked complete; the run before the newest one was used
    SecondMostRecent { context_id: String },
}

impl RunSelection {
    pub fn context_id(&self) -> Option<&str> {
        match self {
            RunSelection::AllRecords => None,
            RunSelection::LatestComplete { context_id } | RunSelection::SecondMostRecent { context_id } => {
                Some(context_id)
            }
        }
    }
}

/// Pick the last completed run from a log the analyzing process also writes to.
///
/// `current` is the run doing the analysis; its records are never kept. A
/// run is complete when its last record is SUCCESS or FAILURE, and the most
/// recent complete run wins. Without any complete run the run written just
/// before the current one is used. A log holding only the current run yields
/// no records, and a log with a single other context is kept whole.
pub fn select_completed_run(records: Vec<LogRecord>, current: Option<&str>) -> (Vec<LogRecord>, RunSelection) {
    let runs = runs_by_recency(&records);
    let previous: Vec<&(String, Level)> = runs.iter().filter(|(id, _)| Some(id.as_str()) != current).collect();
    if previous.is_empty() {
        return (Vec::new(), RunSelection::AllRecords);
    }
    if runs.len() == 1 {
        return (records, RunSelection::AllRecords);
    }

    let selection = match previous.iter().find(|(_, last)| last.is_terminal()) {
        Some((id, _)) => RunSelection::LatestComplete { context_id: id.clone() },
        // Without a known current run the newest one is presumed still running.
        None if previous.len() == runs.len() => RunSelection::SecondMostRecent {
            context_id: runs[1].0.clone(),
        },
        None => RunSelection::SecondMostRecent {
            context_id: previous[0].0.clone(),
        },
    };

    let keep = selection.context_id().unwrap_or_default().to_string();
    tracing::debug!(?selection, runs = runs.len(), "selected run for self-analysis");
    let kept = records.into_iter().filter(|r| r.context_id == keep).collect();
    (kept, selection)
}

/// Distinct context ids with the level of their last record, newest first.
///
/// Recency is the file position of a run's last record, so interleaved
/// concurrent runs are ordered by when they stopped writing.
fn runs_by_recency(records: &[LogRecord]) -> Vec<(String, Level)> {
    let mut runs: Vec<(String, Level)> = Vec::new();
    for record in records.iter().rev() {
        if !runs.iter().any(|(id, _)| *id == record.context_id) {
            runs.push((record.context_id.clone(), record.level));
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_log_str;

    fn line(level: &str, ctx: &str, health: i64, impact: i64, event: &str) -> String {
        format!(
            "[2026-10-16 09:00:00.000] {} | assess | a@h:1 | {} | HEALTH: {}% (raw: {}, Δ{})\n  EVENT: {}\n---\n",
            level, ctx, health, health, impact, event
        )
    }

    fn records(lines: &[String]) -> Vec<LogRecord> {
        parse_log_str(&lines.concat()).records
    }

    #[test]
    fn test_counts_and_final_health() {
        let recs = records(&[
            line("OPERATION", "r1", 0, 0, "start"),
            line("CHECK", "r1", 10, 10, "Checking: a"),
            line("WARNING", "r1", 8, -2, "slow"),
            line("FAILURE", "r1", -5, -13, "b"),
            line("CONTEXT", "r1", -5, 0, "snap"),
            line("SUCCESS", "r1", 40, 45, "done"),
        ]);
        let health = aggregate("assess", recs);
        assert_eq!(health.final_health, 40);
        assert_eq!(health.operation_count, 1);
        assert_eq!(health.check_count, 1);
        assert_eq!(health.warning_count, 1);
        assert_eq!(health.failure_count, 1);
        assert_eq!(health.success_count, 1);
        assert_eq!(health.history.len(), 6);
        assert_eq!(health.history[3].impact, -13);
        assert_eq!(health.context_ids(), vec!["r1"]);
    }

    #[test]
    fn test_empty_component() {
        let health = aggregate("idle", Vec::new());
        assert_eq!(health.final_health, 0);
        assert!(health.history.is_empty());
    }

    #[test]
    fn test_selects_earlier_complete_run_over_incomplete_latest() {
        let recs = records(&[
            line("CHECK", "r1", 10, 10, "Checking: a"),
            line("CHECK", "r1", 30, 20, "Checking: b"),
            line("SUCCESS", "r1", 100, 70, "done"),
            line("CHECK", "r2", 10, 10, "Checking: a"),
        ]);
        let (kept, selection) = select_completed_run(recs, None);
        assert_eq!(selection, RunSelection::LatestComplete { context_id: "r1".into() });
        assert_eq!(kept.len(), 3);
        assert_eq!(aggregate("assess", kept).final_health, 100);
    }

    #[test]
    fn test_skips_current_run_even_when_it_looks_complete() {
        let recs = records(&[
            line("SUCCESS", "r1", 90, 90, "done"),
            line("FAILURE", "r2", -10, -10, "crashed"),
            line("SUCCESS", "r3", 50, 50, "in progress"),
        ]);
        let (_, selection) = select_completed_run(recs, Some("r3"));
        assert_eq!(selection, RunSelection::LatestComplete { context_id: "r2".into() });
    }

    #[test]
    fn test_two_incomplete_runs_fall_back_to_second_most_recent() {
        let recs = records(&[
            line("CHECK", "r1", 10, 10, "Checking: a"),
            line("CHECK", "r2", 10, 10, "Checking: a"),
            line("CHECK", "r3", 10, 10, "Checking: a"),
        ]);
        let (kept, selection) = select_completed_run(recs, None);
        assert_eq!(selection, RunSelection::SecondMostRecent { context_id: "r2".into() });
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_single_run_is_kept_whole() {
        let recs = records(&[line("CHECK", "r1", 10, 10, "Checking: a")]);
        let (kept, selection) = select_completed_run(recs, Some("r9"));
        assert_eq!(selection, RunSelection::AllRecords);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_current_run_alone_yields_nothing() {
        let recs = records(&[
            line("SUCCESS", "r1", 5, 5, "emitter-initialized"),
            line("CHECK", "r1", 9, 4, "Checking: arguments-parsed"),
        ]);
        let (kept, selection) = select_completed_run(recs, Some("r1"));
        assert!(kept.is_empty());
        assert_eq!(selection, RunSelection::AllRecords);
    }

    #[test]
    fn test_incomplete_previous_run_is_used_over_current() {
        let recs = records(&[
            line("CHECK", "r1", 10, 10, "Checking: a"),
            line("CHECK", "r2", 5, 5, "Checking: a"),
        ]);
        let (kept, selection) = select_completed_run(recs, Some("r2"));
        assert_eq!(selection, RunSelection::SecondMostRecent { context_id: "r1".into() });
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].context_id, "r1");
    }
}
