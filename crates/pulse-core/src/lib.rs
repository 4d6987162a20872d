//! Pulse Core - health-scored events and divergence analysis
//!
//! Components emit structured, health-scored events while they run. A
//! separate batch analysis later reads those events back, rebuilds each
//! component's health trajectory, finds where observed outcomes diverged
//! from declared expectations, and proposes a remediation route.
//!
//! # Architecture
//!
//! ```text
//!  Emitter ──► <base>/logs/<category>/<component>.log ─┐
//!                                                      ├─► parser ─► correlate ─► aggregate
//!  Inspector ─► <base>/debug/<component>/*.debug ──────┘                              │
//!                                                                                     ▼
//!        report ◄── assessment ◄── patterns ◄── divergence ◄──────────────────────────┘
//!          │
//!          └──► routing (advisory restoration proposals)
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use pulse_core::{details, Analyzer, Emitter, PulseConfig};
//!
//! let config = PulseConfig::load_or_default(&pulse_core::config::home_dir().join("config.toml"));
//!
//! let mut emitter = Emitter::new("validate", &config);
//! emitter.declare_health_total(47);
//! emitter.check("file-exists", true, 10, details! {});
//! emitter.check("syntax-ok", true, 30, details! {});
//! emitter.success("done", 7, details! {});
//!
//! let assessment = Analyzer::new(&config).run().unwrap();
//! println!("{}", pulse_core::report::render(&assessment));
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod aggregate;
pub mod assessment;
pub mod config;
pub mod context;
pub mod correlate;
pub mod divergence;
pub mod emitter;
pub mod error;
pub mod health;
pub mod inspector;
pub mod parser;
pub mod paths;
pub mod patterns;
pub mod record;
pub mod report;
pub mod routing;
pub mod wire;

pub use aggregate::{aggregate, select_completed_run, ComponentHealth, RunSelection};
pub use assessment::{assess, Analyzer, SystemAssessment};
pub use config::{ExpectedHealthMap, PulseConfig};
pub use correlate::{correlate, CorrelatedContext};
pub use divergence::{classify, detect_divergences, severity_for_gap, DivergencePattern, HealthDivergence, Severity};
pub use emitter::Emitter;
pub use error::{PulseError, Result, ResultExt};
pub use inspector::Inspector;
pub use parser::{parse_debug_file, parse_log_file, ParseOutcome};
pub use record::{
    Details, ErrorType, InspectionKind, InspectionRecord, Level, LogRecord, OperationType, RecoveryHint,
    SemanticMetadata,
};
pub use report::{render, StructuredAssessment};
pub use routing::{RestorationRouter, RouteProposal, RouteSource};

#[doc(hidden)]
pub use serde_json;

/// Version of Pulse Core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the library
pub const NAME: &str = "Pulse Core";
