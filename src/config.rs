use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub show_sql: Option<bool>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Endpoint resolution order: `DATACHAT_URL` env var, then the config
    /// file, then the default.
    pub fn endpoint(&self) -> String {
        std::env::var("DATACHAT_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn show_sql(&self) -> bool {
        self.show_sql.unwrap_or(false)
    }

    /// Persist the SQL-detail toggle so it survives restarts.
    pub fn save_show_sql(show_sql: bool) -> Result<()> {
        let mut config = Self::load().unwrap_or_default();
        config.show_sql = Some(show_sql);
        config.save_to(&Self::config_path()?)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("datachat").join("config.json"))
    }

    /// Directory the log file lives in (same place as the config file).
    pub fn log_dir() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("datachat"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.endpoint.is_none());
        assert_eq!(config.timeout_secs(), DEFAULT_TIMEOUT_SECS);
        assert!(!config.show_sql());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            endpoint: Some("http://analytics:8000".to_string()),
            timeout_secs: Some(5),
            show_sql: Some(true),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.endpoint.as_deref(), Some("http://analytics:8000"));
        assert_eq!(loaded.timeout_secs(), 5);
        assert!(loaded.show_sql());
    }

    #[test]
    fn test_configured_endpoint_wins_over_default() {
        let config = Config {
            endpoint: Some("http://example:9000".to_string()),
            ..Config::default()
        };
        // Only meaningful when DATACHAT_URL is unset in the test environment.
        if std::env::var("DATACHAT_URL").is_err() {
            assert_eq!(config.endpoint(), "http://example:9000");
        }
    }
}
