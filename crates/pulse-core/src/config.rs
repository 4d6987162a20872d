//! Pulse configuration
//!
//! Loaded from `<home>/config.toml`. Every section has defaults, so a
//! missing file (or a file that sets only a few keys) is fine.

use crate::error::{PulseError, Result};
use crate::record::Level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding the Pulse home directory
pub const HOME_ENV: &str = "PULSE_HOME";
/// File name of the configuration inside the home directory
pub const CONFIG_FILE: &str = "config.toml";

/// Check name → expected health impact for one component
pub type ExpectedHealthMap = BTreeMap<String, i64>;

/// Resolve the Pulse home directory: `$PULSE_HOME`, else `~/.pulse`.
pub fn home_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".pulse")
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub paths: PathSettings,
    pub routing: RoutingTable,
    pub rotation: RotationSettings,
    pub context_capture: ContextCaptureSettings,
    pub thresholds: Thresholds,
    /// Per-component expected health maps
    pub expectations: BTreeMap<String, ExpectedHealthMap>,
    /// Error type → remediation strategy overrides
    pub restoration: BTreeMap<String, String>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            paths: PathSettings::default(),
            routing: RoutingTable::default(),
            rotation: RotationSettings::default(),
            context_capture: ContextCaptureSettings::default(),
            thresholds: Thresholds::default(),
            expectations: default_expectations(),
            restoration: BTreeMap::new(),
        }
    }
}

impl PulseConfig {
    /// Defaults rooted at a specific base directory.
    pub fn with_base_dir(mut self, base: impl Into<PathBuf>) -> Self {
        self.paths.base_dir = base.into();
        self
    }

    /// Load configuration from a file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|source| PulseError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a broken file degrades to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Expected health map for a component; empty when none is declared.
    pub fn expected_for(&self, component: &str) -> ExpectedHealthMap {
        self.expectations.get(component).cloned().unwrap_or_default()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.paths.base_dir.join(&self.paths.logs_subdir)
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.paths.base_dir.join(&self.paths.debug_subdir)
    }

    pub fn assessment_dir(&self) -> PathBuf {
        self.paths.base_dir.join("assessment")
    }
}

/// Where the two streams live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub base_dir: PathBuf,
    pub logs_subdir: String,
    pub debug_subdir: String,
    pub log_extension: String,
    pub debug_extension: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            base_dir: home_dir(),
            logs_subdir: "logs".to_string(),
            debug_subdir: "debug".to_string(),
            log_extension: ".log".to_string(),
            debug_extension: ".debug".to_string(),
        }
    }
}

/// Component → category lookup used for file routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingTable {
    pub default_category: String,
    /// Category name → components filed under it
    pub categories: BTreeMap<String, Vec<String>>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            "commands".to_string(),
            strings(&["validate", "test", "status", "diagnose", "assess"]),
        );
        categories.insert(
            "libraries".to_string(),
            strings(&["operations", "sudoers", "environment", "display", "logging", "debugging"]),
        );
        categories.insert("scripts".to_string(), strings(&["build"]));
        Self {
            default_category: "system-level".to_string(),
            categories,
        }
    }
}

impl RoutingTable {
    /// Category a component's files are written under.
    pub fn category_for(&self, component: &str) -> &str {
        self.categories
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == component))
            .map(|(category, _)| category.as_str())
            .unwrap_or(&self.default_category)
    }
}

/// Size-based rotation of emitter files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    pub enabled: bool,
    pub max_size_bytes: u64,
    pub max_rotations: u32,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_bytes: 10 * 1024 * 1024,
            max_rotations: 5,
        }
    }
}

/// Which levels capture the full context block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextCaptureSettings {
    pub full_context_levels: Vec<Level>,
    /// Environment variables with this prefix are copied into the full block
    pub env_prefix: String,
}

impl Default for ContextCaptureSettings {
    fn default() -> Self {
        Self {
            full_context_levels: Level::ALL
                .into_iter()
                .filter(|l| l.full_context_by_default())
                .collect(),
            env_prefix: "PULSE_".to_string(),
        }
    }
}

impl ContextCaptureSettings {
    pub fn is_full(&self, level: Level) -> bool {
        self.full_context_levels.contains(&level)
    }
}

/// Health thresholds used when classifying components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Below this a component is critical
    pub critical: i64,
    /// Below this (and not critical) a component is degraded
    pub degraded: i64,
    /// Below this overall health earns a monitoring recommendation
    pub warning: i64,
    /// More warnings than this count as accumulation
    pub warning_count: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical: -30,
            degraded: 0,
            warning: 50,
            warning_count: 5,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_expectations() -> BTreeMap<String, ExpectedHealthMap> {
    let assess: ExpectedHealthMap = [
        ("emitter-initialized", 5),
        ("arguments-parsed", 5),
        ("log-directory-located", 3),
        ("log-files-read", 10),
        ("log-entries-parsed", 30),
        ("component-health-aggregated", 20),
        ("cross-component-correlation", 15),
        ("pattern-identification", 15),
        ("proposed-vs-actual-comparison", 5),
        ("problems-classified", 8),
        ("severity-determined", 5),
        ("recommendations-generated", 8),
        ("assessment-displayed", 3),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let demo: ExpectedHealthMap = [
        ("partial-success-test", 30),
        ("complete-failure-test", 40),
        ("unexpected-failure-test", 20),
        ("perfect-match-test", 15),
        ("over-performance-test", 10),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let mut map = BTreeMap::new();
    map.insert("assess".to_string(), assess);
    map.insert("divergence-demo".to_string(), demo);
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_routing() {
        let table = RoutingTable::default();
        assert_eq!(table.category_for("validate"), "commands");
        assert_eq!(table.category_for("sudoers"), "libraries");
        assert_eq!(table.category_for("build"), "scripts");
        assert_eq!(table.category_for("something-new"), "system-level");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = PulseConfig::from_toml(
            r#"
            [thresholds]
            critical = -50

            [routing.categories]
            hooks = ["pre-commit"]

            [expectations.validate]
            file-exists = 10
            syntax-ok = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.thresholds.critical, -50);
        assert_eq!(config.thresholds.warning_count, 5);
        assert_eq!(config.routing.category_for("pre-commit"), "hooks");
        assert_eq!(config.routing.default_category, "system-level");
        assert_eq!(config.expected_for("validate")["syntax-ok"], 30);
        assert!(config.expected_for("unknown").is_empty());
        assert_eq!(config.paths.logs_subdir, "logs");
    }

    #[test]
    fn test_full_context_levels() {
        let capture = ContextCaptureSettings::default();
        assert!(capture.is_full(Level::Failure));
        assert!(capture.is_full(Level::Debug));
        assert!(!capture.is_full(Level::Check));

        let custom = PulseConfig::from_toml("[context_capture]\nfull_context_levels = [\"CHECK\"]\n").unwrap();
        assert!(custom.context_capture.is_full(Level::Check));
        assert!(!custom.context_capture.is_full(Level::Failure));
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert_eq!(PulseConfig::load(&path).unwrap().thresholds, Thresholds::default());

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[thresholds\ncritical = ").unwrap();
        let err = PulseConfig::load(&path).unwrap_err();
        assert!(matches!(err, PulseError::Config { .. }));

        let fallback = PulseConfig::load_or_default(&path);
        assert_eq!(fallback.rotation.max_rotations, 5);
    }
}
