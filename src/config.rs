//! Settings for the three external services the enricher talks to.
//!
//! Every value can be supplied through a builder or read from the
//! environment with [`Config::from_env`]. Secrets are never printed by the
//! `Debug` implementations.

use bon::Builder;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_KMA_BASE_URL: &str = "https://apihub.kma.go.kr";
pub const DEFAULT_SGIS_BASE_URL: &str = "https://sgisapi.kostat.go.kr";
pub const DEFAULT_BLOB_PREFIX: &str = "silver/";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(100);

pub const ENV_KMA_AUTH_KEY: &str = "KMA_API_AUTH_KEY";
pub const ENV_KMA_BASE_URL: &str = "KMA_API_BASE_URL";
pub const ENV_SGIS_CONSUMER_KEY: &str = "SGIS_CONSUMER_KEY";
pub const ENV_SGIS_CONSUMER_SECRET: &str = "SGIS_CONSUMER_SECRET";
pub const ENV_SGIS_BASE_URL: &str = "SGIS_API_BASE_URL";
pub const ENV_AZURE_CONNECTION_STRING: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const ENV_AZURE_CONTAINER: &str = "AZURE_CONTAINER_NAME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable '{0}' is not set")]
    MissingVariable(&'static str),
}

/// KMA API Hub settings.
#[derive(Clone, Builder)]
pub struct KmaConfig {
    #[builder(into)]
    pub auth_key: String,
    #[builder(into, default = DEFAULT_KMA_BASE_URL.to_string())]
    pub base_url: String,
    #[builder(default = 3)]
    pub max_attempts: u32,
    #[builder(default = Duration::from_secs(5))]
    pub retry_delay: Duration,
}

/// SGIS OpenAPI credentials.
#[derive(Clone, Builder)]
pub struct SgisConfig {
    #[builder(into)]
    pub consumer_key: String,
    #[builder(into)]
    pub consumer_secret: String,
    #[builder(into, default = DEFAULT_SGIS_BASE_URL.to_string())]
    pub base_url: String,
}

/// Azure Data Lake destination.
#[derive(Clone, Builder)]
pub struct AzureConfig {
    #[builder(into)]
    pub connection_string: String,
    #[builder(into)]
    pub container: String,
    /// Blob path or directory prefix (ending in `/`) for uploaded files.
    #[builder(into, default = DEFAULT_BLOB_PREFIX.to_string())]
    pub blob_path: String,
}

/// Complete enricher configuration.
#[derive(Clone, Builder)]
pub struct Config {
    pub kma: KmaConfig,
    pub sgis: SgisConfig,
    /// Upload is skipped when this is `None`.
    pub azure: Option<AzureConfig>,
    #[builder(default = DEFAULT_HTTP_TIMEOUT)]
    pub http_timeout: Duration,
}

impl Config {
    /// Reads the configuration from environment variables.
    ///
    /// `KMA_API_AUTH_KEY`, `SGIS_CONSUMER_KEY` and `SGIS_CONSUMER_SECRET` are
    /// required. Azure upload is enabled only when both
    /// `AZURE_STORAGE_CONNECTION_STRING` and `AZURE_CONTAINER_NAME` are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingVariable(name));

        let kma = KmaConfig::builder()
            .auth_key(require(ENV_KMA_AUTH_KEY)?)
            .maybe_base_url(get(ENV_KMA_BASE_URL))
            .build();
        let sgis = SgisConfig::builder()
            .consumer_key(require(ENV_SGIS_CONSUMER_KEY)?)
            .consumer_secret(require(ENV_SGIS_CONSUMER_SECRET)?)
            .maybe_base_url(get(ENV_SGIS_BASE_URL))
            .build();
        let azure = match (get(ENV_AZURE_CONNECTION_STRING), get(ENV_AZURE_CONTAINER)) {
            (Some(connection_string), Some(container)) => Some(
                AzureConfig::builder()
                    .connection_string(connection_string)
                    .container(container)
                    .build(),
            ),
            _ => None,
        };

        Ok(Config::builder()
            .kma(kma)
            .sgis(sgis)
            .maybe_azure(azure)
            .build())
    }
}

impl fmt::Debug for KmaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmaConfig")
            .field("auth_key", &"***")
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl fmt::Debug for SgisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SgisConfig")
            .field("consumer_key", &"***")
            .field("consumer_secret", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("connection_string", &"***")
            .field("container", &self.container)
            .field("blob_path", &self.blob_path)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("kma", &self.kma)
            .field("sgis", &self.sgis)
            .field("azure", &self.azure)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}
