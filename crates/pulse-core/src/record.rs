//! Record types shared by both event streams
//!
//! [`LogRecord`] is what the emitter writes, [`InspectionRecord`] is what the
//! inspector writes. Both are immutable once written; everything derived from
//! them is recomputed per analysis run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Free-form structured extras attached to a record.
///
/// Values are arbitrary JSON so callers can attach any shape without a
/// schema change; keys are kept sorted so the written form is stable.
pub type Details = BTreeMap<String, serde_json::Value>;

/// Build a [`Details`] map from `key => value` pairs.
///
/// ```
/// let d = pulse_core::details! { "file" => "/etc/hosts", "attempts" => 3 };
/// assert_eq!(d["attempts"], serde_json::json!(3));
/// ```
#[macro_export]
macro_rules! details {
    () => { $crate::record::Details::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::record::Details::new();
        $( map.insert(($key).to_string(), $crate::serde_json::json!($value)); )+
        map
    }};
}

/// Severity class of one emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Operation,
    Success,
    Failure,
    Error,
    Warning,
    Check,
    Context,
    Debug,
}

impl Level {
    /// Every level, in display order.
    pub const ALL: [Level; 8] = [
        Level::Operation,
        Level::Success,
        Level::Failure,
        Level::Error,
        Level::Warning,
        Level::Check,
        Level::Context,
        Level::Debug,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Operation => "OPERATION",
            Level::Success => "SUCCESS",
            Level::Failure => "FAILURE",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Check => "CHECK",
            Level::Context => "CONTEXT",
            Level::Debug => "DEBUG",
        }
    }

    /// Whether this level records the full context block unless configured otherwise.
    ///
    /// High-frequency levels (SUCCESS, CHECK, WARNING) stay lightweight.
    pub fn full_context_by_default(self) -> bool {
        !matches!(self, Level::Success | Level::Check | Level::Warning)
    }

    /// Levels that close out a run when they are its last record.
    pub fn is_terminal(self) -> bool {
        matches!(self, Level::Success | Level::Failure)
    }

    /// Levels whose events are compared against an expected health map.
    pub fn is_scored_check(self) -> bool {
        matches!(self, Level::Check | Level::Success | Level::Failure)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OPERATION" => Ok(Level::Operation),
            "SUCCESS" => Ok(Level::Success),
            "FAILURE" => Ok(Level::Failure),
            "ERROR" => Ok(Level::Error),
            "WARNING" => Ok(Level::Warning),
            "CHECK" => Ok(Level::Check),
            "CONTEXT" | "SNAPSHOT" => Ok(Level::Context),
            "DEBUG" => Ok(Level::Debug),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// Declares a string-backed taxonomy enum with an open `Other` variant so
/// that values written by newer emitters still parse.
macro_rules! taxonomy {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Other(s) => s.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                match s.as_str() {
                    $($text => $name::$variant,)+
                    _ => $name::Other(s),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

taxonomy! {
    /// Primary category of the operation an event describes
    OperationType {
        FileValidation => "file_validation",
        ConfigValidation => "config_validation",
        SystemOperation => "system_operation",
        Parsing => "parsing",
        Analysis => "analysis",
        IoOperation => "io_operation",
    }
}

taxonomy! {
    /// Classification of what went wrong
    ErrorType {
        FileNotFound => "file_not_found",
        PermissionDenied => "permission_denied",
        ParseError => "parse_error",
        ValidationError => "validation_error",
        MissingDependency => "missing_dependency",
        Timeout => "timeout",
        UnexpectedValue => "unexpected_value",
        ResourceExhausted => "resource_exhausted",
    }
}

taxonomy! {
    /// Broad remediation family suggested by the emitting code
    RecoveryHint {
        AutomatedFix => "automated_fix",
        InstallDependency => "install_dependency",
        UpdateConfig => "update_config",
        Retry => "retry",
        ManualIntervention => "manual_intervention",
        Investigate => "investigate",
    }
}

impl RecoveryHint {
    /// Hints that need a human in the loop.
    pub fn needs_human(&self) -> bool {
        matches!(self, RecoveryHint::ManualIntervention | RecoveryHint::Investigate)
    }
}

/// Routing metadata attached to an event at emission time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<OperationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(default, skip_serializing_if = "Details::is_empty")]
    pub error_details: Details,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_hint: Option<RecoveryHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Details::is_empty")]
    pub recovery_params: Details,
}

impl SemanticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(mut self, kind: impl Into<OperationType>, subtype: impl Into<String>) -> Self {
        self.operation_type = Some(kind.into());
        let subtype = subtype.into();
        if !subtype.is_empty() {
            self.operation_subtype = Some(subtype);
        }
        self
    }

    pub fn error(mut self, kind: impl Into<ErrorType>, details: Details) -> Self {
        self.error_type = Some(kind.into());
        self.error_details = details;
        self
    }

    pub fn recovery(
        mut self,
        hint: impl Into<RecoveryHint>,
        strategy: impl Into<String>,
        params: Details,
    ) -> Self {
        self.recovery_hint = Some(hint.into());
        let strategy = strategy.into();
        if !strategy.is_empty() {
            self.recovery_strategy = Some(strategy);
        }
        self.recovery_params = params;
        self
    }

    /// True when no field carries information.
    pub fn is_empty(&self) -> bool {
        self.operation_type.is_none()
            && self.operation_subtype.is_none()
            && self.error_type.is_none()
            && self.error_details.is_empty()
            && self.recovery_hint.is_none()
            && self.recovery_strategy.is_none()
            && self.recovery_params.is_empty()
    }
}

/// One event written by an [`Emitter`](crate::emitter::Emitter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub level: Level,
    pub component: String,
    /// `user@host:pid` of the writing process
    pub identity: String,
    pub context_id: String,
    pub event: String,
    /// Running sum of impacts at the time of writing
    pub raw_health: i64,
    /// Normalized health in -100..=100 at the time of writing
    pub normalized_health: i64,
    /// This event's own signed impact
    pub health_impact: i64,
    /// Full context block; `None` for lightweight levels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub details: Details,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticMetadata>,
}

impl LogRecord {
    /// Event label with the "Checking: " prefix removed.
    pub fn check_name(&self) -> &str {
        self.event
            .strip_prefix(crate::wire::CHECK_EVENT_PREFIX)
            .unwrap_or(&self.event)
    }
}

/// Kind of state-contract snapshot written by the inspector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionKind {
    Snapshot,
    ExpectedState,
    Divergence,
    Conditional,
    Timing,
    SlowTiming,
    Counter,
    CountDivergence,
    Checkpoint,
    Flow,
    UnexpectedFlow,
    SystemContext,
}

impl InspectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InspectionKind::Snapshot => "SNAPSHOT",
            InspectionKind::ExpectedState => "EXPECTED_STATE",
            InspectionKind::Divergence => "DIVERGENCE",
            InspectionKind::Conditional => "CONDITIONAL",
            InspectionKind::Timing => "TIMING",
            InspectionKind::SlowTiming => "SLOW_TIMING",
            InspectionKind::Counter => "COUNTER",
            InspectionKind::CountDivergence => "COUNT_DIVERGENCE",
            InspectionKind::Checkpoint => "CHECKPOINT",
            InspectionKind::Flow => "FLOW",
            InspectionKind::UnexpectedFlow => "UNEXPECTED_FLOW",
            InspectionKind::SystemContext => "SYSTEM_CONTEXT",
        }
    }

    /// Kinds the writer flagged as off-contract.
    pub fn is_divergent(self) -> bool {
        matches!(
            self,
            InspectionKind::Divergence
                | InspectionKind::SlowTiming
                | InspectionKind::CountDivergence
                | InspectionKind::UnexpectedFlow
        )
    }
}

impl fmt::Display for InspectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InspectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "SNAPSHOT" => InspectionKind::Snapshot,
            "EXPECTED_STATE" => InspectionKind::ExpectedState,
            "DIVERGENCE" => InspectionKind::Divergence,
            "CONDITIONAL" => InspectionKind::Conditional,
            "TIMING" => InspectionKind::Timing,
            "SLOW_TIMING" => InspectionKind::SlowTiming,
            "COUNTER" => InspectionKind::Counter,
            "COUNT_DIVERGENCE" => InspectionKind::CountDivergence,
            "CHECKPOINT" => InspectionKind::Checkpoint,
            "FLOW" => InspectionKind::Flow,
            "UNEXPECTED_FLOW" => InspectionKind::UnexpectedFlow,
            "SYSTEM_CONTEXT" => InspectionKind::SystemContext,
            other => return Err(format!("unknown inspection kind '{}'", other)),
        };
        Ok(kind)
    }
}

/// One state snapshot written by an [`Inspector`](crate::inspector::Inspector)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub timestamp: NaiveDateTime,
    pub kind: InspectionKind,
    pub component: String,
    pub identity: String,
    /// Join key with the emitter stream; always populated.
    pub context_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
    #[serde(default)]
    pub details: Details,
}

impl InspectionRecord {
    /// Consumer-side comparison of expected and actual, when both were recorded.
    pub fn matches(&self) -> Option<bool> {
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => Some(expected == actual),
            _ => None,
        }
    }
}
