//! Process identity and the full context block
//!
//! Identity (`user@host:pid`) is resolved once per emitter. The context
//! block is re-captured for every full-context record since cwd, load and
//! memory change while a component runs.

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::Path;

const UNKNOWN: &str = "unknown";
const LOADAVG_PATH: &str = "/proc/loadavg";
const MEMINFO_PATH: &str = "/proc/meminfo";
const HOSTNAME_PATH: &str = "/proc/sys/kernel/hostname";

/// Variables describing non-interactive automation, always captured when set
const AUTOMATION_VARS: &[&str] = &[
    "DEBIAN_FRONTEND",
    "PIP_NO_INPUT",
    "NPM_CONFIG_YES",
    "GIT_EDITOR",
    "EDITOR",
    "VISUAL",
];

/// Who is writing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub user: String,
    pub host: String,
    pub pid: u32,
}

impl ProcessIdentity {
    pub fn current() -> Self {
        Self {
            user: current_user(),
            host: hostname(),
            pid: std::process::id(),
        }
    }
}

impl std::fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.pid)
    }
}

/// Snapshot of the process environment at one moment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemContext {
    pub identity: ProcessIdentity,
    pub cwd: String,
    pub shell: String,
    pub env: BTreeMap<String, String>,
    pub load: String,
    pub memory: String,
}

impl SystemContext {
    /// Capture the current state. Anything unreadable becomes `unknown`.
    pub fn capture(identity: &ProcessIdentity, env_prefix: &str) -> Self {
        Self {
            identity: identity.clone(),
            cwd: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| UNKNOWN.to_string()),
            shell: shell_description(),
            env: captured_env(env_prefix),
            load: load_average(),
            memory: memory_usage(),
        }
    }

    /// Flatten into the `key: value` lines of a `CONTEXT:` block.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("user".to_string(), self.identity.user.clone());
        map.insert("host".to_string(), self.identity.host.clone());
        map.insert("pid".to_string(), self.identity.pid.to_string());
        map.insert("cwd".to_string(), self.cwd.clone());
        map.insert("shell".to_string(), self.shell.clone());
        map.insert("load".to_string(), self.load.clone());
        map.insert("memory".to_string(), self.memory.clone());
        for (key, value) in &self.env {
            map.insert(format!("env.{}", key), value.clone());
        }
        map
    }
}

fn current_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn hostname() -> String {
    if let Some(host) = std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()) {
        return host;
    }
    std::fs::read_to_string(HOSTNAME_PATH)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn shell_description() -> String {
    let shell = std::env::var("SHELL").unwrap_or_default();
    let kind = Path::new(&shell)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();
    let mode = if std::io::stdin().is_terminal() {
        "interactive"
    } else {
        "non-interactive"
    };
    format!("{} ({})", kind, mode)
}

fn captured_env(prefix: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for var in AUTOMATION_VARS {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                env.insert(var.to_string(), value);
            }
        }
    }
    if !prefix.is_empty() {
        for (key, value) in std::env::vars() {
            if key.starts_with(prefix) {
                env.insert(key, value);
            }
        }
    }
    env
}

fn load_average() -> String {
    std::fs::read_to_string(LOADAVG_PATH)
        .ok()
        .and_then(|text| parse_loadavg(&text))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn memory_usage() -> String {
    std::fs::read_to_string(MEMINFO_PATH)
        .ok()
        .and_then(|text| parse_meminfo(&text))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse_loadavg(text: &str) -> Option<String> {
    let fields: Vec<&str> = text.split_whitespace().take(3).collect();
    (fields.len() == 3).then(|| fields.join(" "))
}

/// `used/total MB` from `/proc/meminfo` (values are in KiB).
fn parse_meminfo(text: &str) -> Option<String> {
    let mut total = None;
    let mut available = None;
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next().and_then(|v| v.parse::<u64>().ok())) {
            (Some("MemTotal:"), Some(kb)) => total = Some(kb),
            (Some("MemAvailable:"), Some(kb)) => available = Some(kb),
            _ => {}
        }
        if total.is_some() && available.is_some() {
            break;
        }
    }
    let (total, available) = (total?, available?);
    Some(format!(
        "{}/{} MB",
        total.saturating_sub(available) / 1024,
        total / 1024
    ))
}
