use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ApiUrls;
use crate::domain::AuthenticatedUser;
use crate::fetch::RetryConfig;

/// Environment variables that override the configured base URLs
pub const STUDIO_BASE_URL_ENV: &str = "STUDIO_BASE_URL";
pub const LMS_BASE_URL_ENV: &str = "LMS_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub api: ApiConfig,
    pub user: AuthenticatedUser,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub studio_base_url: String,
    pub lms_base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let urls = ApiUrls::default();
        Self {
            studio_base_url: urls.studio_base_url,
            lms_base_url: urls.lms_base_url,
            timeout_ms: 30000,
        }
    }
}

impl ApiConfig {
    pub fn urls(&self) -> ApiUrls {
        ApiUrls::new(&self.studio_base_url, &self.lms_base_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            api: ApiConfig::default(),
            user: AuthenticatedUser::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Base URLs from the environment win over the file
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(STUDIO_BASE_URL_ENV).filter(|v| !v.is_empty()) {
            log::debug!("{} overrides studio_base_url", STUDIO_BASE_URL_ENV);
            self.api.studio_base_url = url;
        }
        if let Some(url) = lookup(LMS_BASE_URL_ENV).filter(|v| !v.is_empty()) {
            log::debug!("{} overrides lms_base_url", LMS_BASE_URL_ENV);
            self.api.lms_base_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.studio_base_url.is_empty() {
            eyre::bail!("api.studio_base_url must be set");
        }
        if self.api.lms_base_url.is_empty() {
            eyre::bail!("api.lms_base_url must be set");
        }
        if self.api.timeout_ms == 0 {
            eyre::bail!("api.timeout_ms must be > 0");
        }
        self.retry.validate().context("Invalid retry config")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.timeout_ms, 30000);
        assert_eq!(config.retry.max_retries, 10);
        assert_eq!(config.retry.initial_delay_ms, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
api:
  studio_base_url: https://studio.example.com
user:
  username: staff
  administrator: true
retry:
  max_retries: 3
  initial_delay_ms: 10
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.studio_base_url, "https://studio.example.com");
        assert_eq!(config.user.username, "staff");
        assert!(config.user.administrator);
        assert_eq!(config.retry.max_retries, 3);
        // Other fields should have defaults
        assert_eq!(config.api.lms_base_url, ApiUrls::default().lms_base_url);
        assert_eq!(config.retry.backoff_multiplier, 1.5);
    }

    #[test]
    fn test_load_explicit_path() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("authoring.yml");
        fs::write(&path, "retry:\n  enabled: false\n")?;

        let config = Config::load(Some(&path))?;

        assert!(!config.retry.enabled);
        Ok(())
    }

    #[test]
    fn test_load_explicit_path_missing() {
        let path = PathBuf::from("/nonexistent/authoring.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_retry() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("authoring.yml");
        fs::write(&path, "retry:\n  backoff_multiplier: 0.5\n")?;

        assert!(Config::load(Some(&path)).is_err());
        Ok(())
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (STUDIO_BASE_URL_ENV, "http://studio.local"),
            (LMS_BASE_URL_ENV, ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.studio_base_url, "http://studio.local");
        // Empty values are ignored
        assert_eq!(config.api.lms_base_url, ApiUrls::default().lms_base_url);
        assert_eq!(config.api.urls().studio_base_url, "http://studio.local");
    }

    #[test]
    fn test_invalid_timeout() {
        let config = Config {
            api: ApiConfig {
                timeout_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
