use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result, anyhow};

use crate::backend::BackendKind;
use crate::documents::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "DOCCHAT_API_URL";
pub const BACKEND_ENV: &str = "DOCCHAT_BACKEND";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOG_FILTER: &str = "info";

/// On-disk configuration. Every field is optional; missing ones fall back to
/// the environment and then to defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub backend: Option<String>,
    pub api_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_filter: Option<String>,
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<BackendKind>,
    pub api_url: Option<String>,
}

/// Fully resolved settings for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: BackendKind,
    pub api_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_filter: String,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::get_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// A config with every field filled from `settings`, for `config init`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            backend: Some(settings.backend.as_str().to_string()),
            api_url: Some(settings.api_url.clone()),
            poll_interval_secs: Some(settings.poll_interval.as_secs()),
            request_timeout_secs: Some(settings.request_timeout.as_secs()),
            log_filter: Some(settings.log_filter.clone()),
        }
    }

    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings> {
        self.resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Precedence: command line, then environment, then file, then defaults.
    pub fn resolve_with(
        &self,
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Settings> {
        let backend = match overrides.backend {
            Some(kind) => kind,
            None => match env(BACKEND_ENV).or_else(|| self.backend.clone()) {
                Some(name) => BackendKind::from_str(&name)
                    .ok_or_else(|| anyhow!("unknown backend '{}' (expected local or remote)", name))?,
                None => BackendKind::Remote,
            },
        };

        let api_url = overrides
            .api_url
            .clone()
            .or_else(|| env(API_URL_ENV))
            .or_else(|| self.api_url.clone())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim().trim_end_matches('/').to_string();

        let poll_interval = self
            .poll_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let request_timeout = Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        );

        let log_filter = self
            .log_filter
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Settings {
            backend,
            api_url,
            poll_interval,
            request_timeout,
            log_filter,
        })
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("docchat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let settings = Config::new().resolve_with(&Overrides::default(), no_env).unwrap();
        assert_eq!(settings.backend, BackendKind::Remote);
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.poll_interval, Duration::from_secs(180));
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn test_precedence() {
        let config = Config {
            backend: Some("remote".to_string()),
            api_url: Some("http://from-file:1".to_string()),
            ..Config::default()
        };
        let env = |key: &str| match key {
            API_URL_ENV => Some("http://from-env:2/".to_string()),
            BACKEND_ENV => Some("local".to_string()),
            _ => None,
        };

        let settings = config.resolve_with(&Overrides::default(), env).unwrap();
        assert_eq!(settings.api_url, "http://from-env:2");
        assert_eq!(settings.backend, BackendKind::Local);

        let overrides = Overrides {
            backend: Some(BackendKind::Remote),
            api_url: Some("http://from-cli:3".to_string()),
        };
        let settings = config.resolve_with(&overrides, env).unwrap();
        assert_eq!(settings.api_url, "http://from-cli:3");
        assert_eq!(settings.backend, BackendKind::Remote);

        let settings = config.resolve_with(&Overrides::default(), no_env).unwrap();
        assert_eq!(settings.api_url, "http://from-file:1");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let config = Config {
            backend: Some("ollama".to_string()),
            ..Config::default()
        };
        let err = config.resolve_with(&Overrides::default(), no_env).unwrap_err();
        assert!(err.to_string().contains("ollama"));
    }

    #[test]
    fn test_zero_poll_interval_uses_default() {
        let config = Config {
            poll_interval_secs: Some(0),
            ..Config::default()
        };
        let settings = config.resolve_with(&Overrides::default(), no_env).unwrap();
        assert_eq!(settings.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        assert_eq!(Config::load_from(&path).unwrap(), Config::new());

        let settings = Config::new().resolve_with(&Overrides::default(), no_env).unwrap();
        let config = Config::from_settings(&settings);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.resolve_with(&Overrides::default(), no_env).unwrap(), settings);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ backend: ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
