// src/config.rs

//! Configuration loading.
//!
//! A missing file means defaults; a file that exists must parse. Environment
//! overrides are applied last and the result is validated.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load `path` (or defaults when it does not exist), apply env overrides, validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let config = Config::load(path)?;
        log::info!("Loaded configuration from {}", path.display());
        config
    } else {
        log::debug!("No config at {}, using defaults", path.display());
        Config::default()
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.download.default_concurrency, 5);
    }

    #[test]
    fn test_file_values_are_read_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[download]\ndefault_concurrency = 12\n").unwrap();
        assert_eq!(load_config(&path).unwrap().download.default_concurrency, 12);

        std::fs::write(&path, "[download]\ndefault_concurrency = 0\n").unwrap();
        assert!(load_config(&path).is_err());

        std::fs::write(&path, "[download\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
