//! Config file loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use segue_core::PlayerConfig;
use tracing::debug;

/// Default config location, e.g. `~/.config/segue/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "segue").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load the player config.
///
/// An explicit path must exist. Without one, the default location is used
/// if present and built-in defaults otherwise.
pub fn load(explicit: Option<&Path>) -> Result<PlayerConfig> {
    if let Some(path) = explicit {
        return read(path);
    }

    match default_path() {
        Some(path) if path.is_file() => read(&path),
        _ => {
            debug!("No config file found, using defaults");
            Ok(PlayerConfig::default())
        }
    }
}

fn read(path: &Path) -> Result<PlayerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: PlayerConfig = toml::from_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segue.toml");
        std::fs::write(&path, "sample_rate = 48000\nsetting_delay_ms = 20\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.setting_delay_ms, 20);
        assert_eq!(config.block_size, PlayerConfig::default().block_size);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "sample_rate = \"fast\"").unwrap();

        let err = load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
