use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use pulse_core::config::{home_dir, CONFIG_FILE};
use pulse_core::{
    details, report, Analyzer, Emitter, ExpectedHealthMap, PulseConfig, RestorationRouter, StructuredAssessment,
    SystemAssessment,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Component name this tool logs under
const COMPONENT: &str = "assess";
const STRUCTURED_FILE: &str = "latest.json";

/// Pulse Assessment - health and divergence analysis of component logs
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Restrict analysis to one component
    #[arg(long, value_name = "NAME")]
    component: Option<String>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PulseConfig::load_or_default(&home_dir().join(CONFIG_FILE));
    let expected = config.expected_for(COMPONENT);

    let mut emitter = Emitter::new(COMPONENT, &config);
    emitter.declare_health_total(expected.values().sum());
    let weight = |name: &str| expected.get(name).copied().unwrap_or_default();

    let log_file = emitter.log_path().display().to_string();
    emitter.success("emitter-initialized", weight("emitter-initialized"), details! { "log" => log_file });
    emitter.check("arguments-parsed", true, weight("arguments-parsed"), details! {
        "component" => cli.component.clone().unwrap_or_else(|| "all".to_string()),
    });
    let logs_dir = config.logs_dir();
    let located = logs_dir.is_dir();
    emitter.check(
        "log-directory-located",
        located,
        if located { weight("log-directory-located") } else { 0 },
        details! { "path" => logs_dir.display().to_string() },
    );

    let analysis = Analyzer::new(&config)
        .with_component(cli.component.clone())
        .with_self_run(COMPONENT, emitter.context_id())
        .run();

    let assessment = match analysis {
        Ok(assessment) => assessment,
        Err(e) if e.is_no_log_files() => {
            emitter.failure("log-files-read", &e.to_string(), -weight("log-files-read"), details! {});
            eprintln!("{} {}", "✗".red().bold(), e);
            return Ok(ExitCode::from(1));
        }
        Err(e) => {
            emitter.failure("log-files-read", &e.to_string(), -weight("log-files-read"), details! {});
            return Err(e.into());
        }
    };

    if let Some(component) = &cli.component {
        if assessment.components.is_empty() {
            emitter.failure(
                "log-files-read",
                "no records for requested component",
                -weight("log-files-read"),
                details! { "component" => component.as_str() },
            );
            eprintln!("{} no log records found for component '{}'", "✗".red().bold(), component);
            return Ok(ExitCode::from(1));
        }
    }

    record_pipeline(&mut emitter, &assessment, &expected);

    print!("{}", report::render(&assessment));

    let router = RestorationRouter::from_config(&config);
    let structured_path = config.assessment_dir().join(STRUCTURED_FILE);
    match StructuredAssessment::build(&assessment, &router).write_to(&structured_path) {
        Ok(()) => println!("Structured assessment: {}", structured_path.display()),
        Err(e) => {
            tracing::warn!(path = %structured_path.display(), error = %e, "could not write structured assessment");
            emitter.warning("structured-output-failed", 0, details! { "error" => e.to_string() });
        }
    }

    println!();
    print_status(&assessment);

    emitter.success("assessment-displayed", weight("assessment-displayed"), details! {
        "overall_health" => assessment.overall_health,
        "divergences" => assessment.divergence_count(),
    });

    if assessment.has_critical_issues() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// One CHECK per analysis stage, scored against the tool's own expectations.
fn record_pipeline(emitter: &mut Emitter, assessment: &SystemAssessment, expected: &ExpectedHealthMap) {
    let weight = |name: &str| expected.get(name).copied().unwrap_or_default();

    emitter.check("log-files-read", true, weight("log-files-read"), details! {
        "components" => assessment.components.len(),
    });

    // Parse errors halve the credit for the parsing stage.
    let parsed_cleanly = assessment.parse_errors == 0;
    let parse_impact = if parsed_cleanly {
        weight("log-entries-parsed")
    } else {
        weight("log-entries-parsed") / 2
    };
    emitter.check("log-entries-parsed", parsed_cleanly, parse_impact, details! {
        "entries" => assessment.total_entries,
        "parse_errors" => assessment.parse_errors,
        "inspection_entries" => assessment.debug_entries,
    });

    emitter.check("component-health-aggregated", true, weight("component-health-aggregated"), details! {
        "overall_health" => assessment.overall_health,
    });
    emitter.check("cross-component-correlation", true, weight("cross-component-correlation"), details! {
        "issues" => assessment.cross_component_issues.len(),
        "joined_contexts" => assessment.joined_contexts(),
    });
    emitter.check("pattern-identification", true, weight("pattern-identification"), details! {
        "patterns" => assessment.patterns.len(),
    });
    emitter.check("proposed-vs-actual-comparison", true, weight("proposed-vs-actual-comparison"), details! {
        "divergences" => assessment.divergence_count(),
    });
    emitter.check("problems-classified", true, weight("problems-classified"), details! {
        "critical" => assessment.critical_issues.len(),
        "warnings" => assessment.warnings.len(),
    });
    emitter.check("severity-determined", true, weight("severity-determined"), details! {});
    emitter.check("recommendations-generated", true, weight("recommendations-generated"), details! {
        "recommendations" => assessment.recommendations.len(),
    });
}

fn print_status(assessment: &SystemAssessment) {
    let summary = format!(
        "overall health {}% across {} component(s), {} divergence(s)",
        assessment.overall_health,
        assessment.components.len(),
        assessment.divergence_count()
    );
    if assessment.has_critical_issues() {
        println!("{} {} - {} critical issue(s)", "✗".red().bold(), summary, assessment.critical_issues.len());
    } else if !assessment.warnings.is_empty() {
        println!("{} {} - {} warning(s)", "⚠".yellow().bold(), summary, assessment.warnings.len());
    } else {
        println!("{} {}", "✓".green().bold(), summary);
    }
}
