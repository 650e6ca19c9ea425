use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://cal.lk/wp-admin/admin-ajax.php";
pub const DEFAULT_ACTION: &str = "getUTFundRates";
pub const DEFAULT_FUND: &str = "Capital Alliance Quantitative Equity Fund";
pub const DEFAULT_START_DATE: &str = "2013-01-01";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CalProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CalProviderConfig {
    fn default() -> Self {
        CalProviderConfig {
            base_url: default_base_url(),
            action: default_action(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CalProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: CalProviderConfig,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default)]
    pub data_path: Option<String>,
    #[serde(default = "default_fund")]
    pub default_fund: String,
    #[serde(default = "default_start_date")]
    pub default_start_date: String,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: CalProviderConfig::default(),
            request_delay_ms: default_request_delay_ms(),
            data_path: None,
            default_fund: default_fund(),
            default_start_date: default_start_date(),
            server: ServerConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_fund() -> String {
    DEFAULT_FUND.to_string()
}

fn default_start_date() -> String {
    DEFAULT_START_DATE.to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5000".to_string(),
        "http://127.0.0.1:5000".to_string(),
    ]
}

impl AppConfig {
    /// Loads the config from the default location, falling back to defaults
    /// when no file has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("lk", "calfund", "calfund")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("lk", "calfund", "calfund")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        // An empty document deserializes to unit, not to a map of defaults
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/rates"
  timeout_secs: 3
request_delay_ms: 250
data_path: "/tmp/calfund"
default_fund: "Capital Alliance Income Fund"
server:
  port: 8080
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/rates");
        assert_eq!(config.provider.action, DEFAULT_ACTION);
        assert_eq!(config.provider.timeout(), Duration::from_secs(3));
        assert_eq!(config.request_delay(), Duration::from_millis(250));
        assert_eq!(config.data_path.as_deref(), Some("/tmp/calfund"));
        assert_eq!(config.default_fund, "Capital Alliance Income Fund");
        assert_eq!(config.default_start_date, DEFAULT_START_DATE);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cors_origins.len(), 2);
    }

    #[test]
    fn test_config_defaults_for_missing_sections() {
        let config: AppConfig = serde_yaml::from_str("data_path: null").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_custom_data_path_wins() {
        let config = AppConfig {
            data_path: Some("/srv/funds".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/srv/funds")
        );
    }

    #[test]
    fn test_load_from_empty_file_uses_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
