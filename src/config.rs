use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Service configuration, loaded from a TOML file. Every field has a
/// default so a missing file falls back to a usable local setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen_addr: String,
    pub debug: bool,
    /// Optional path prefix for subdirectory deployments behind a reverse
    /// proxy; the whole router is nested under it.
    pub url_prefix: Option<String>,
    /// SQLite file holding the per-machine recipe-run tables.
    pub database: PathBuf,
    /// Machine name -> log-directory root for file-backed machines.
    pub log_paths: BTreeMap<String, PathBuf>,
    pub template_glob: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            listen_addr: "0.0.0.0:8000".to_string(),
            debug: false,
            url_prefix: None,
            database: PathBuf::from("deposition_runs.sqlite"),
            log_paths: BTreeMap::new(),
            template_glob: "templates/**/*.html".to_string(),
        }
    }
}

impl AppConfig {
    /// Read the config file, or fall back to the built-in defaults when it
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/sputterview.toml")).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert!(config.log_paths.is_empty());
        assert!(config.url_prefix.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            listen_addr = "127.0.0.1:9000"
            url_prefix = "/sputter"

            [log_paths]
            orion = "/data/orion/logs"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.url_prefix.as_deref(), Some("/sputter"));
        assert_eq!(
            config.log_paths.get("orion"),
            Some(&PathBuf::from("/data/orion/logs"))
        );
        assert_eq!(config.database, PathBuf::from("deposition_runs.sqlite"));
    }
}
