//! Restoration routing
//!
//! Maps a divergence to a named remediation strategy. The output is advisory:
//! nothing here runs a remediation.

use crate::config::PulseConfig;
use crate::divergence::{DivergencePattern, HealthDivergence};
use crate::record::{Details, RecoveryHint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANUAL_REVIEW: &str = "manual_review";

const ERROR_TYPE_STRATEGIES: &[(&str, &str)] = &[
    ("permission_denied", "fix_file_permissions"),
    ("file_not_found", "restore_missing_file"),
    ("missing_dependency", "install_package"),
    ("parse_error", "repair_config"),
    ("validation_error", "repair_config"),
    ("timeout", "retry_operation"),
    ("resource_exhausted", "free_resources"),
    ("unexpected_value", "investigate_value"),
];

/// Which rule produced a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteSource {
    /// The emitting code named the strategy itself
    Explicit,
    ErrorType,
    Pattern,
    Fallback,
}

/// Proposed remediation for one divergence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteProposal {
    pub strategy: String,
    pub source: RouteSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<RecoveryHint>,
    #[serde(default, skip_serializing_if = "Details::is_empty")]
    pub params: Details,
    pub requires_human: bool,
}

/// Selects strategies: explicit, then by error type, then by pattern, then manual review.
#[derive(Debug, Clone)]
pub struct RestorationRouter {
    error_strategies: BTreeMap<String, String>,
}

impl Default for RestorationRouter {
    fn default() -> Self {
        Self {
            error_strategies: ERROR_TYPE_STRATEGIES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl RestorationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table with the `[restoration]` overrides applied.
    pub fn from_config(config: &PulseConfig) -> Self {
        let mut router = Self::default();
        router
            .error_strategies
            .extend(config.restoration.iter().map(|(k, v)| (k.clone(), v.clone())));
        router
    }

    pub fn route(&self, divergence: &HealthDivergence) -> RouteProposal {
        let semantic = divergence.semantic.as_ref();
        let hint = semantic.and_then(|s| s.recovery_hint.clone());
        let params = semantic.map(|s| s.recovery_params.clone()).unwrap_or_default();

        let (strategy, source) = if let Some(explicit) = semantic.and_then(|s| s.recovery_strategy.clone()) {
            (explicit, RouteSource::Explicit)
        } else if let Some(mapped) = semantic
            .and_then(|s| s.error_type.as_ref())
            .and_then(|e| self.error_strategies.get(e.as_str()))
        {
            (mapped.clone(), RouteSource::ErrorType)
        } else if let Some(by_pattern) = pattern_strategy(divergence.pattern) {
            (by_pattern.to_string(), RouteSource::Pattern)
        } else {
            (MANUAL_REVIEW.to_string(), RouteSource::Fallback)
        };

        let requires_human = source == RouteSource::Fallback || hint.as_ref().map(|h| h.needs_human()).unwrap_or(false);
        RouteProposal {
            strategy,
            source,
            hint,
            params,
            requires_human,
        }
    }
}

fn pattern_strategy(pattern: DivergencePattern) -> Option<&'static str> {
    match pattern {
        DivergencePattern::CompleteFailure => Some("rerun_check"),
        DivergencePattern::UnexpectedFailure => Some("investigate_failure"),
        DivergencePattern::PartialSuccess => Some("review_partial_result"),
        DivergencePattern::OverPerformance => Some("recalibrate_expectations"),
        DivergencePattern::Unknown => None,
    }
}
