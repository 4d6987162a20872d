//! E2E Test: Emitter and inspector streams
//!
//! Covers what lands on disk: tolerant parsing, normalization as written,
//! and the context-id join between the two streams.

use proptest::prelude::*;
use pulse_core::record::InspectionKind;
use pulse_core::{details, health, parse_log_file, Analyzer, Emitter, Inspector, PulseConfig};
use std::io::Write;
use std::time::Duration;

/// E2E test: malformed lines are counted and skipped, valid entries survive
#[test]
fn e2e_parser_counts_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    let mut emitter = Emitter::new("build", &config);
    emitter.operation("cargo", 0, &["build", "--release"]);
    emitter.check("artifact-present", true, 10, details! { "multi" => "line one\n\nline three" });
    emitter.success("done", 5, details! {});

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(emitter.log_path())
        .unwrap();
    writeln!(file, "stray text outside any entry").unwrap();
    writeln!(file, "[not a timestamp] BROKEN | build").unwrap();
    writeln!(file, "---").unwrap();
    drop(file);

    let outcome = parse_log_file(emitter.log_path()).unwrap();
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.errors, 2);
    assert_eq!(outcome.records[1].details["multi"], "line one\n\nline three");
    assert_eq!(outcome.records[0].details["command"], "cargo");

    let assessment = Analyzer::new(&config).run().unwrap();
    assert_eq!(assessment.parse_errors, 2);
    assert_eq!(assessment.components["build"].operation_count, 1);
}

/// E2E test: detail keys containing colons read back unchanged
#[test]
fn e2e_detail_keys_with_colons_survive() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    let mut emitter = Emitter::new("fetch", &config);
    emitter.success("mirrors-checked", 5, details! {
        "https://mirror.example/a" => "ok",
        "plain" => "value: with colon",
    });

    let outcome = parse_log_file(emitter.log_path()).unwrap();
    assert_eq!(outcome.errors, 0);
    let details = &outcome.records[0].details;
    assert_eq!(details["https://mirror.example/a"], "ok");
    assert_eq!(details["plain"], "value: with colon");
    assert!(!details.contains_key("https_//mirror.example/a"));
}

/// E2E test: inspector records join the emitter run on its context id
#[test]
fn e2e_inspector_joins_emitter_context() {
    let dir = tempfile::tempdir().unwrap();
    let config = PulseConfig::default().with_base_dir(dir.path());

    let mut emitter = Emitter::new("sudoers", &config);
    let mut inspector = Inspector::for_emitter(&emitter, &config).unwrap();
    assert!(!inspector.is_enabled());
    inspector.enable().unwrap();

    emitter.check("permissions", false, -20, details! {});
    inspector.expected_state("file mode", &"0440", &"0644", details! { "path" => "/etc/sudoers.d/pulse" });
    inspector.timing("visudo", Duration::from_millis(5), Duration::from_secs(1));
    inspector.counter("entries", 3, 3);
    emitter.failure("install", "permission check failed", -10, details! {});

    let assessment = Analyzer::new(&config).run().unwrap();
    assert_eq!(assessment.debug_entries, 3);
    assert_eq!(assessment.joined_contexts(), 1);

    let joined = &assessment.correlated[emitter.context_id()];
    assert_eq!(joined.logs.len(), 2);
    assert_eq!(joined.inspections.len(), 3);
    let divergent: Vec<_> = joined.divergent_inspections().collect();
    assert_eq!(divergent.len(), 1);
    assert_eq!(divergent[0].kind, InspectionKind::Divergence);
    assert_eq!(divergent[0].label, "file mode");
    assert!(divergent[0]
        .call_site
        .as_deref()
        .is_some_and(|site| site.contains("e2e_streams_test.rs")));
}

/// E2E test: an inspector without a context id cannot be built
#[test]
fn e2e_inspector_requires_context_id() {
    let config = PulseConfig::default();
    assert!(Inspector::new("sudoers", "", &config).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every written record carries the normalization of the running sum.
    #[test]
    fn prop_written_health_matches_normalization(
        total in 1i64..400,
        impacts in prop::collection::vec(-60i64..60, 1..12),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let config = PulseConfig::default().with_base_dir(dir.path());
        let mut emitter = Emitter::new("validate", &config);
        emitter.declare_health_total(total);
        for (i, impact) in impacts.iter().enumerate() {
            emitter.check(&format!("step-{}", i), *impact >= 0, *impact, details! {});
        }

        let outcome = parse_log_file(emitter.log_path()).unwrap();
        prop_assert_eq!(outcome.errors, 0);
        prop_assert_eq!(outcome.records.len(), impacts.len());

        let expected = health::trajectory(&impacts, total);
        let mut raw = 0i64;
        for ((record, impact), want) in outcome.records.iter().zip(&impacts).zip(&expected) {
            raw += impact;
            prop_assert_eq!(record.raw_health, raw);
            prop_assert_eq!(record.health_impact, *impact);
            prop_assert_eq!(record.normalized_health, *want);
            prop_assert_eq!(record.normalized_health, health::normalize(raw, total));
        }
    }
}
