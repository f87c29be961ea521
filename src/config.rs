use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CONFIG_DIR_NAME, DEFAULT_CLIENT_NAME, DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_SERVER, DEFAULT_SUBJECT,
};

const CONFIG_FILE_NAME: &str = "config.yaml";

/// User configuration, read from `~/.natspanel/config.yaml`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker WebSocket URLs, tried in order
    pub servers: Vec<String>,
    /// Initial subscribe subject
    pub subject: String,
    /// Initial publish subject
    pub publish_subject: String,
    pub client_name: String,
    pub drain_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            servers: vec![DEFAULT_SERVER.to_string()],
            subject: DEFAULT_SUBJECT.to_string(),
            publish_subject: DEFAULT_SUBJECT.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_or_init(&Self::default_path())
    }

    /// Load from `path`, first writing the defaults there if it is missing
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }

        let config = Config::default();
        match config.save_to(path) {
            Ok(()) => tracing::info!(path = %path.display(), "Wrote default config"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not write default config"),
        }
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        config.servers.retain(|s| !s.trim().is_empty());
        if config.servers.is_empty() {
            config.servers.push(DEFAULT_SERVER.to_string());
        }
        Ok(config)
    }

    /// Write to `path`, creating its directory
    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.servers, vec![DEFAULT_SERVER.to_string()]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "servers:\n  - ws://localhost:8080\nsubject: sensors.>\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.servers, vec!["ws://localhost:8080".to_string()]);
        assert_eq!(config.subject, "sensors.>");
        assert_eq!(config.publish_subject, DEFAULT_SUBJECT);
        assert_eq!(config.drain_timeout(), Duration::from_millis(DEFAULT_DRAIN_TIMEOUT_MS));
    }

    #[test]
    fn test_empty_server_list_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "servers: []\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.servers, vec![DEFAULT_SERVER.to_string()]);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "servers: [unterminated\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_first_run_writes_starter_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        fs::write(&path, "client_name: edited\n").unwrap();
        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.client_name, "edited");
        assert_eq!(config.servers, vec![DEFAULT_SERVER.to_string()]);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = Config {
            client_name: "bench".to_string(),
            drain_timeout_ms: 250,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
