//! Configuration management for the parq CLI and SDK

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{ParqError, Result};

/// CLI-level configuration persisted as JSON under the user config dir
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub endpoint: String,
    pub timeout: u64,
    pub verbose: bool,
    pub storage_dir: PathBuf,
    pub token_storage_enabled: bool,
    pub vapid_public_key: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.parq.kz/api".to_string(),
            timeout: 30,
            verbose: false,
            storage_dir: default_storage_dir(),
            token_storage_enabled: true,
            vapid_public_key: None,
        }
    }
}

impl CliConfig {
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        if config_file.exists() {
            let content = fs::read_to_string(&config_file).await?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => Ok(config),
                Err(_) => {
                    let config = Self::default();
                    config.save(&config_file).await?;
                    Ok(config)
                }
            }
        } else {
            let config = Self::default();
            config.save(&config_file).await?;
            Ok(config)
        }
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content).await?;
        Ok(())
    }

    /// Lower this CLI config into the SDK client configuration
    pub fn to_client_config(&self) -> Result<ClientConfig> {
        let mut builder = ClientConfig::builder()
            .base_url(&self.endpoint)
            .timeout(self.timeout)
            .verbose(self.verbose);

        if self.token_storage_enabled {
            let token_config = TokenStorageConfig {
                enabled: true,
                storage_path: Some(
                    self.storage_dir
                        .join("session.json")
                        .to_string_lossy()
                        .to_string(),
                ),
            };
            builder = builder.token_storage(token_config);
        }

        if let Some(key) = &self.vapid_public_key {
            builder = builder.vapid_public_key(key);
        }

        builder.build()
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parq")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parq")
}

/// Token storage configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TokenStorageConfig {
    #[serde(default)]
    pub enabled: bool,
    pub storage_path: Option<String>,
}

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub token_storage: TokenStorageConfig,
    /// Bounded attempts for requests that produced no HTTP response
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay in milliseconds; doubles per attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Seconds before access-token expiry at which the background refresh fires
    #[serde(default = "default_refresh_lead_secs")]
    pub refresh_lead_secs: u64,
    /// Public VAPID key for push-subscription registration
    #[serde(default)]
    pub vapid_public_key: Option<String>,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_refresh_lead_secs() -> u64 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.parq.kz/api".to_string(),
            timeout: default_timeout(),
            verbose: false,
            token_storage: TokenStorageConfig::default(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            refresh_lead_secs: default_refresh_lead_secs(),
            vapid_public_key: None,
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<u64>,
    verbose: Option<bool>,
    token_storage: Option<TokenStorageConfig>,
    config_file: Option<PathBuf>,
    vapid_public_key: Option<String>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    pub fn token_storage(mut self, token_storage: TokenStorageConfig) -> Self {
        self.token_storage = Some(token_storage);
        self
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn vapid_public_key<S: Into<String>>(mut self, key: S) -> Self {
        self.vapid_public_key = Some(key.into());
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_file_and_env(self.config_file.as_deref())?;

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }
        if let Some(token_storage) = self.token_storage {
            config.token_storage = token_storage;
        }
        if let Some(key) = self.vapid_public_key {
            config.vapid_public_key = Some(key);
        }

        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    pub fn new() -> Result<Self> {
        Self::from_file_and_env::<&str>(None)
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub fn from_file_and_env<P: AsRef<Path>>(config_file: Option<P>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("base_url", "https://api.parq.kz/api")?
            .set_default("timeout", 30)?
            .set_default("verbose", false)?
            .set_default("max_attempts", 3)?
            .set_default("backoff_base_ms", 500)?
            .set_default("refresh_lead_secs", 60)?;

        if let Some(config_path) = config_file {
            if config_path.as_ref().exists() {
                builder = builder.add_source(File::from(config_path.as_ref()));
            }
        }
        builder = builder.add_source(Environment::with_prefix("PARQ").try_parsing(true));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ParqError::invalid_endpoint("Base URL cannot be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ParqError::invalid_endpoint(format!(
                "Base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.max_attempts == 0 {
            return Err(ParqError::invalid_input("max_attempts must be at least 1"));
        }
        Ok(())
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    /// Effective per-request timeout
    ///
    /// Verbose runs get double the allowance: debug diagnostics slow local
    /// network stacks enough to trip the default limit.
    pub fn effective_timeout(&self) -> std::time::Duration {
        let secs = if self.verbose {
            self.timeout * 2
        } else {
            self.timeout
        };
        std::time::Duration::from_secs(secs)
    }
}
