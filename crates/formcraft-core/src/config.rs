use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub webhook: WebhookConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_env("FORMCRAFT")
    }

    /// Load configuration from environment with custom prefix
    pub fn load_from_env(prefix: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("webhook.timeout_seconds", 10)?
            .set_default("webhook.max_attempts", 4)?
            .set_default("webhook.backoff_base_seconds", 1)?
            .set_default("webhook.response_body_limit", 8192)?
            .set_default("webhook.user_agent", "FormCraft-Webhook/1.0")?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load configuration from file with environment overrides
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("FORMCRAFT").separator("__"));

        let config = builder.build()?;
        config.try_deserialize()
    }
}

/// Outbound webhook delivery configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Total attempts per delivery chain (initial + retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff in seconds
    #[serde(default = "default_backoff_base_seconds")]
    pub backoff_base_seconds: u64,
    /// Logged response bodies are truncated to this many bytes
    #[serde(default = "default_response_body_limit")]
    pub response_body_limit: usize,
    /// User-Agent header sent on every delivery
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_seconds)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_attempts: default_max_attempts(),
            backoff_base_seconds: default_backoff_base_seconds(),
            response_body_limit: default_response_body_limit(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    4
}

fn default_backoff_base_seconds() -> u64 {
    1
}

fn default_response_body_limit() -> usize {
    8192
}

fn default_user_agent() -> String {
    "FormCraft-Webhook/1.0".to_string()
}
