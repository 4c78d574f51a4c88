use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub azure: AzureAdConfig,
    pub obo: OboConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Confidential client registration used for the on-behalf-of grant
#[derive(Debug, Clone, Deserialize)]
pub struct AzureAdConfig {
    #[serde(default = "default_instance")]
    pub instance: String,
    pub tenant_id: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OboConfig {
    /// Scope incoming caller tokens are issued for (this service's own API)
    pub source_scope: String,
    /// Scope requested for the agent service
    pub target_scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Pre-provisioned assistant; when absent one is created per request
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Confirm `agent_id` with the service before each conversation
    #[serde(default)]
    pub verify_agent: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub poll_max_wait_secs: Option<u64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_question")]
    pub default_question: String,
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_instance() -> String {
    "https://login.microsoftonline.com/".to_string()
}

fn default_api_version() -> String {
    conduit_agent::DEFAULT_API_VERSION.to_string()
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_question() -> String {
    "Give me number of buildings per tenant.".to_string()
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables: CONDUIT_<SECTION>__<KEY>, e.g. CONDUIT_AGENT__ENDPOINT
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("CONDUIT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;

        let mut cfg: Config = config.try_deserialize()?;

        // Load secrets from ENV (not in TOML)
        cfg.client_secret = std::env::var("AZURE_CLIENT_SECRET").map_err(|_| {
            ConfigError::Message("AZURE_CLIENT_SECRET environment variable is required".to_string())
        })?;

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }
}
