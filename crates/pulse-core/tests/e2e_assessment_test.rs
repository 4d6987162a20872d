//! E2E Test: Assessment pipeline
//!
//! Emits through real `Emitter`s into a temporary base directory and runs
//! the `Analyzer` over the result.

use pulse_core::divergence::{DivergencePattern, Severity};
use pulse_core::record::ErrorType;
use pulse_core::routing::RouteSource;
use pulse_core::{
    details, Analyzer, Emitter, PulseConfig, RestorationRouter, RunSelection, SemanticMetadata, StructuredAssessment,
};
use tempfile::TempDir;

fn config_with(dir: &TempDir, toml: &str) -> PulseConfig {
    PulseConfig::from_toml(toml)
        .expect("test config should parse")
        .with_base_dir(dir.path())
}

/// E2E test: a run that meets every expectation scores 100 with no divergence
#[test]
fn e2e_matching_run_has_full_health() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(
        &dir,
        r#"
[expectations.validate]
file-exists = 10
syntax-ok = 30
done = 7
"#,
    );

    let mut emitter = Emitter::new("validate", &config);
    emitter.declare_health_total(47);
    emitter.check("file-exists", true, 10, details! { "path" => "/etc/hosts" });
    emitter.check("syntax-ok", true, 30, details! {});
    emitter.success("done", 7, details! {});
    assert_eq!(emitter.write_failures(), 0);
    assert!(emitter.log_path().ends_with("logs/commands/validate.log"));

    let assessment = Analyzer::new(&config).run().unwrap();
    let validate = &assessment.components["validate"];
    assert_eq!(validate.final_health, 100);
    assert_eq!(validate.check_count, 2);
    assert_eq!(validate.success_count, 1);
    assert!(validate.divergences.is_empty());
    assert_eq!(assessment.total_entries, 3);
    assert_eq!(assessment.parse_errors, 0);
    assert_eq!(assessment.overall_health, 100);
    assert!(!assessment.has_critical_issues());
}

/// E2E test: a failure where success was expected is a critical unexpected failure
#[test]
fn e2e_unexpected_failure_is_detected_and_routed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(
        &dir,
        r#"
[expectations.sudoers]
permissions = 30
"#,
    );

    let mut emitter = Emitter::new("sudoers", &config);
    emitter.failure_with_semantic(
        "permissions",
        "mode 0644",
        -30,
        details! { "file" => "/etc/sudoers.d/pulse" },
        SemanticMetadata::new().error(ErrorType::PermissionDenied, details! { "mode" => "0644" }),
    );

    let assessment = Analyzer::new(&config).run().unwrap();
    let sudoers = &assessment.components["sudoers"];
    assert_eq!(sudoers.divergences.len(), 1);

    let d = &sudoers.divergences[0];
    assert_eq!(d.check_name, "permissions");
    assert_eq!(d.expected, 30);
    assert_eq!(d.actual, -30);
    assert_eq!(d.gap, -60);
    assert_eq!(d.severity, Severity::Critical);
    assert_eq!(d.pattern, DivergencePattern::UnexpectedFailure);
    assert_eq!(d.context_id, emitter.context_id());
    assert!(assessment.has_critical_issues());
    assert_eq!(assessment.divergence_summary["unexpected-failure"], 1);

    let structured = StructuredAssessment::build(&assessment, &RestorationRouter::from_config(&config));
    assert_eq!(structured.divergences[0].route.strategy, "fix_file_permissions");
    assert_eq!(structured.divergences[0].route.source, RouteSource::ErrorType);
}

/// E2E test: the analyzing run ignores itself and picks the last completed run
#[test]
fn e2e_self_analysis_selects_last_completed_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    let mut completed = Emitter::new("assess", &config).with_context_id("assess-run-a");
    completed.declare_health_total(10);
    completed.check("arguments-parsed", true, 5, details! {});
    completed.success("emitter-initialized", 5, details! {});

    let mut interrupted = Emitter::new("assess", &config).with_context_id("assess-run-b");
    interrupted.declare_health_total(10);
    interrupted.check("arguments-parsed", true, 5, details! {});

    let mut current = Emitter::new("assess", &config).with_context_id("assess-run-c");
    current.check("log-directory-located", true, 3, details! {});

    let assessment = Analyzer::new(&config)
        .with_self_run("assess", current.context_id())
        .run()
        .unwrap();
    let assess = &assessment.components["assess"];
    assert_eq!(
        assess.selection,
        RunSelection::LatestComplete {
            context_id: "assess-run-a".to_string()
        }
    );
    assert_eq!(assess.record_count(), 2);
    assert_eq!(assess.final_health, 100);
    assert!(assess.divergences.is_empty());
}

/// E2E test: a fresh system holding only the running analysis has nothing to analyze
#[test]
fn e2e_running_context_alone_is_no_log_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    let mut current = Emitter::new("assess", &config).with_context_id("assess-run-c");
    current.success("emitter-initialized", 5, details! {});
    current.check("log-directory-located", true, 3, details! {});

    let err = Analyzer::new(&config)
        .with_self_run("assess", current.context_id())
        .run()
        .unwrap_err();
    assert!(err.is_no_log_files());

    Emitter::new("build", &config).success("compiled", 10, details! {});
    let assessment = Analyzer::new(&config)
        .with_self_run("assess", current.context_id())
        .run()
        .unwrap();
    assert!(assessment.components.contains_key("build"));
    assert!(!assessment.components.contains_key("assess"));
}

/// E2E test: after a rotation the last completed run is read from the rotated file
#[test]
fn e2e_self_analysis_reads_newest_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    let mut completed = Emitter::new("assess", &config).with_context_id("assess-run-a");
    completed.check("arguments-parsed", true, 5, details! {});
    completed.success("emitter-initialized", 5, details! {});
    let log_path = completed.log_path().to_path_buf();
    std::fs::rename(&log_path, log_path.with_extension("log.1")).unwrap();

    let mut current = Emitter::new("assess", &config).with_context_id("assess-run-c");
    current.check("log-directory-located", true, 3, details! {});

    let assessment = Analyzer::new(&config)
        .with_self_run("assess", current.context_id())
        .run()
        .unwrap();
    let assess = &assessment.components["assess"];
    assert_eq!(
        assess.selection,
        RunSelection::LatestComplete {
            context_id: "assess-run-a".to_string()
        }
    );
    assert_eq!(assess.record_count(), 2);
    assert!(assess.records.iter().all(|r| r.context_id == "assess-run-a"));
}

/// E2E test: the component filter keeps only the requested component
#[test]
fn e2e_component_filter() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    Emitter::new("build", &config).success("compiled", 10, details! {});
    Emitter::new("status", &config).warning("stale cache", -2, details! {});

    let assessment = Analyzer::new(&config)
        .with_component(Some("status".to_string()))
        .run()
        .unwrap();
    assert_eq!(assessment.components.keys().collect::<Vec<_>>(), vec!["status"]);
    assert_eq!(assessment.components["status"].warning_count, 1);

    let none = Analyzer::new(&config)
        .with_component(Some("missing".to_string()))
        .run()
        .unwrap();
    assert!(none.components.is_empty());
}

/// E2E test: an empty base directory is the one fatal condition
#[test]
fn e2e_no_log_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    let err = Analyzer::new(&config).run().unwrap_err();
    assert!(err.is_no_log_files());
}

/// E2E test: the built-in demonstration expectations produce every pattern
#[test]
fn e2e_divergence_demo_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    let mut emitter = Emitter::new("divergence-demo", &config);
    emitter.declare_health_total(115);
    emitter.check("partial-success-test", true, 15, details! {});
    emitter.check("complete-failure-test", false, 0, details! {});
    emitter.check("unexpected-failure-test", false, -10, details! {});
    emitter.check("perfect-match-test", true, 15, details! {});
    emitter.check("over-performance-test", true, 25, details! {});

    let assessment = Analyzer::new(&config).run().unwrap();
    let demo = &assessment.components["divergence-demo"];
    let found: Vec<(&str, DivergencePattern)> = demo
        .divergences
        .iter()
        .map(|d| (d.check_name.as_str(), d.pattern))
        .collect();
    assert_eq!(
        found,
        vec![
            ("partial-success-test", DivergencePattern::PartialSuccess),
            ("complete-failure-test", DivergencePattern::CompleteFailure),
            ("unexpected-failure-test", DivergencePattern::UnexpectedFailure),
            ("over-performance-test", DivergencePattern::OverPerformance),
        ]
    );
    assert_eq!(demo.divergences[1].severity, Severity::Critical);
    assert_eq!(demo.divergences[2].gap, -30);
    for pattern in ["partial-success", "complete-failure", "unexpected-failure", "over-performance"] {
        assert_eq!(assessment.divergence_summary[pattern], 1);
    }
}
