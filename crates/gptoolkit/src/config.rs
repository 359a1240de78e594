//! Application configuration file support for gptoolkit.
//!
//! Loads configuration from `config.toml` in the data directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gptoolkit_client::DEFAULT_BASE_URL;
use gptoolkit_core::MatchPolicy;
use gptoolkit_db::{APP_DIR_NAME, DB_FILE_NAME};

/// The config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application-level configuration loaded from `config.toml`
#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base URL of the completion API
    pub api_base_url: Option<String>,
    /// Database file, relative paths resolve against the data directory
    pub database: Option<PathBuf>,
    /// HTTP timeout for completion requests
    pub timeout_secs: Option<u64>,
    /// Event log file, relative paths resolve against the data directory
    pub log_file: Option<PathBuf>,
    /// How stored prompts are matched against user input
    #[serde(default)]
    pub matching: MatchPolicy,
}

impl AppConfig {
    /// Load configuration from the data directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(app_dir: &Path) -> Result<Option<Self>> {
        let config_path = app_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Effective database path.
    pub fn database_path(&self, app_dir: &Path) -> PathBuf {
        let file = self
            .database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME));
        app_dir.join(file)
    }

    /// Effective event log path, if file logging is enabled.
    pub fn log_path(&self, app_dir: &Path) -> Option<PathBuf> {
        self.log_file.as_ref().map(|file| app_dir.join(file))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Contents written by `gptoolkit configure` when no config exists.
    pub fn default_contents() -> String {
        format!(
            r#"# gptoolkit configuration
api_base_url = "{}"
database = "{}"
# timeout_secs = 60
# log_file = "gptoolkit.log"

[matching]
# How the user text narrows stored prompts: ignore | substring | exact
prompt = "ignore"
# How the use case name is matched: ignore | substring | exact
use_case = "substring"
"#,
            DEFAULT_BASE_URL, DB_FILE_NAME
        )
    }
}

/// Default data directory (`~/.gptoolkit`).
pub fn default_app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gptoolkit_core::TextPolicy;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_default_contents_parse() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), AppConfig::default_contents()).unwrap();

        let config = AppConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.api_base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.database_path(dir.path()), dir.path().join(DB_FILE_NAME));
        assert_eq!(config.timeout(), None);
        assert_eq!(config.log_path(dir.path()), None);
        assert_eq!(config.matching, MatchPolicy::default());
    }

    #[test]
    fn test_full_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
api_base_url = "http://localhost:1234"
database = "/var/lib/prompts.db"
timeout_secs = 30
log_file = "events.log"

[matching]
prompt = "substring"
use_case = "exact"
"#,
        )
        .unwrap();

        let config = AppConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.api_base_url(), "http://localhost:1234");
        assert_eq!(
            config.database_path(dir.path()),
            PathBuf::from("/var/lib/prompts.db")
        );
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.log_path(dir.path()),
            Some(dir.path().join("events.log"))
        );
        assert_eq!(config.matching.prompt, TextPolicy::Substring);
        assert_eq!(config.matching.use_case, TextPolicy::Exact);
    }

    #[test]
    fn test_unknown_field_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "engine = \"davinci\"\n").unwrap();

        assert!(AppConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::default();
        let dir = Path::new("/tmp/gpt");
        assert_eq!(config.database_path(dir), dir.join(DB_FILE_NAME));
        assert_eq!(config.api_base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_default_app_dir() {
        assert!(default_app_dir().ends_with(APP_DIR_NAME));
    }
}
