//! File layout for both streams
//!
//! ```text
//! <base>/logs/<category>/<component>.log
//! <base>/debug/<component>/<component>-<unix>.debug
//! ```

use crate::config::{PulseConfig, RotationSettings};
use crate::error::{PulseError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Path of the emitter file for a component.
pub fn log_path(config: &PulseConfig, component: &str) -> PathBuf {
    config
        .logs_dir()
        .join(config.routing.category_for(component))
        .join(format!("{}{}", component, config.paths.log_extension))
}

/// Directory holding a component's inspection sessions.
pub fn debug_dir(config: &PulseConfig, component: &str) -> PathBuf {
    config.debug_dir().join(component)
}

/// Every `*.log` under the logs directory, sorted for stable ordering.
///
/// Fails with [`PulseError::NoLogFiles`] when there is nothing to analyze.
pub fn discover_log_files(config: &PulseConfig) -> Result<Vec<PathBuf>> {
    let root = config.logs_dir();
    let files = discover(&root, &config.paths.log_extension);
    if files.is_empty() {
        return Err(PulseError::NoLogFiles(root));
    }
    Ok(files)
}

/// Every `*.debug` under the debug directory. An absent directory is empty.
pub fn discover_debug_files(config: &PulseConfig) -> Vec<PathBuf> {
    discover(&config.debug_dir(), &config.paths.debug_extension)
}

fn discover(root: &Path, extension: &str) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable path during discovery");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.ends_with(extension))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Most recent rotation of a log file (`x.log.1`), when one exists.
pub fn newest_rotation(path: &Path) -> Option<PathBuf> {
    let rotated = rotated_path(path, 1);
    rotated.is_file().then_some(rotated)
}

/// Append one pre-rendered block with a single write call.
///
/// Concurrent writers of the same component rely on append-mode writes of a
/// whole block not interleaving.
pub fn append_block(path: &Path, block: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(block.as_bytes())?;
    Ok(())
}

/// Rotate `x.log → x.log.1 → … → x.log.N` once the file reaches the size limit.
///
/// The oldest rotation is dropped. Returns whether a rotation happened.
pub fn rotate_if_needed(path: &Path, settings: &RotationSettings) -> Result<bool> {
    if !settings.enabled || settings.max_rotations == 0 {
        return Ok(false);
    }
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if size < settings.max_size_bytes {
        return Ok(false);
    }

    let oldest = rotated_path(path, settings.max_rotations);
    if oldest.exists() {
        std::fs::remove_file(&oldest)?;
    }
    for n in (1..settings.max_rotations).rev() {
        let current = rotated_path(path, n);
        if current.exists() {
            std::fs::rename(&current, rotated_path(path, n + 1))?;
        }
    }
    std::fs::rename(path, rotated_path(path, 1))?;
    tracing::debug!(path = %path.display(), size, "rotated log file");
    Ok(true)
}

fn rotated_path(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &Path) -> PulseConfig {
        PulseConfig::default().with_base_dir(base)
    }

    #[test]
    fn test_routing_into_category_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        assert_eq!(
            log_path(&config, "validate"),
            dir.path().join("logs/commands/validate.log")
        );
        assert_eq!(
            log_path(&config, "mystery"),
            dir.path().join("logs/system-level/mystery.log")
        );
        assert_eq!(debug_dir(&config, "validate"), dir.path().join("debug/validate"));
    }

    #[test]
    fn test_discovery_skips_rotations_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        append_block(&log_path(&config, "validate"), "x\n").unwrap();
        append_block(&log_path(&config, "build"), "x\n").unwrap();
        append_block(&dir.path().join("logs/commands/validate.log.1"), "x\n").unwrap();
        append_block(&dir.path().join("logs/notes.txt"), "x\n").unwrap();

        let files = discover_log_files(&config).unwrap();
        assert_eq!(files.len(), 2);
        assert!(discover_debug_files(&config).is_empty());
    }

    #[test]
    fn test_empty_log_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_log_files(&config(dir.path())).unwrap_err();
        assert!(err.is_no_log_files());
    }

    #[test]
    fn test_rotation_shifts_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        let settings = RotationSettings {
            enabled: true,
            max_size_bytes: 4,
            max_rotations: 2,
        };

        std::fs::write(&path, "first").unwrap();
        assert!(rotate_if_needed(&path, &settings).unwrap());
        std::fs::write(&path, "second").unwrap();
        assert!(rotate_if_needed(&path, &settings).unwrap());
        std::fs::write(&path, "third").unwrap();
        assert!(rotate_if_needed(&path, &settings).unwrap());

        assert!(!path.exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.log.1")).unwrap(), "third");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.log.2")).unwrap(), "second");
        assert!(!dir.path().join("a.log.3").exists());
        assert_eq!(newest_rotation(&path), Some(dir.path().join("a.log.1")));
        assert_eq!(newest_rotation(&dir.path().join("b.log")), None);

        std::fs::write(&path, "ok").unwrap();
        assert!(!rotate_if_needed(&path, &settings).unwrap());
    }
}
