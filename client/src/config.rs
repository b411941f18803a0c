use serde::{Deserialize, Serialize};
use shared::PollConfig;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub polling: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://0.0.0.0:8000".to_string(),
            request_timeout_secs: 30,
            polling: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Loads `.env`, then the YAML file (explicit path, `CLIENT_CONFIG`, or
    /// `config/client.yaml`), then applies environment overrides and finally
    /// `base_url` from the command line.
    pub fn load(path: Option<&Path>, base_url: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("CLIENT_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(default_config_path);

        Self::load_from(&path, base_url, |key| env::var(key).ok())
    }

    /// Layers `path`, the variables returned by `lookup` and `base_url`, then
    /// validates the result once.
    pub fn load_from<F>(path: &Path, base_url: Option<&str>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::from_file_or_default(path)?;
        config.apply_overrides(lookup)?;
        if let Some(base_url) = base_url {
            config.api_base_url = base_url.to_string();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ClientConfig = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }

    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            log::info!("Loading client config from {}", path.display());
            Self::from_file(path)
        } else {
            log::info!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Applies `API_BASE_URL`, `POLL_INTERVAL_MS`, `POLL_TIMEOUT_MS` and
    /// `REQUEST_TIMEOUT_SECS` as returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("API_BASE_URL") {
            self.api_base_url = base_url;
        }
        if let Some(value) = lookup("POLL_INTERVAL_MS") {
            self.polling.interval_ms = parse_number("POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("POLL_TIMEOUT_MS") {
            self.polling.timeout_ms = parse_number("POLL_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("REQUEST_TIMEOUT_SECS", &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.api_base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "api_base_url",
                value: self.api_base_url.clone(),
            });
        }
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "polling.interval_ms",
                value: "0".to_string(),
            });
        }
        if self.polling.timeout_ms < self.polling.interval_ms {
            return Err(ConfigError::InvalidValue {
                key: "polling.timeout_ms",
                value: self.polling.timeout_ms.to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        PathBuf::from(manifest_dir).join("../config/client.yaml")
    } else {
        PathBuf::from("config/client.yaml")
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
