use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::sync::SyncPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Base URL of the image search service.
    pub endpoint: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Prepended to image references that are not full URLs.
    #[serde(default)]
    pub download_prefix: Option<String>,
    /// Appended to download URLs under `download_prefix` that carry no query.
    #[serde(default)]
    pub download_query: Option<String>,
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_web_port")]
    pub web_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_round_timeout_ms() -> u64 {
    5_000
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_web_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".into()
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("IMAGE_MILL").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Settings for tests and embedders that do not read files.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout_secs: default_request_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            download_prefix: None,
            download_query: None,
            round_timeout_ms: default_round_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            web_port: default_web_port(),
            log_level: default_log_level(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            round_timeout: Duration::from_millis(self.round_timeout_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}
