// Configuration structs

use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_CALENDAR_PATH, DEFAULT_CHANNEL_CAPACITY, DEFAULT_EMAIL_PATH,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_STREAM_PATH, DEFAULT_TIMEOUT_SECS,
};
use crate::stream::UnknownRecordPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Assistant backend (reply stream and draft actions)
    pub backend: BackendConfig,

    /// Who drafts are sent as
    pub identity: IdentityConfig,

    /// Reply stream behaviour
    pub stream: StreamConfig,

    pub logging: LoggingConfig,
}

/// Backend endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// e.g. "https://api.colegio.example"
    pub base_url: String,

    /// Bearer token, if the backend requires one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    pub stream_path: String,
    pub email_path: String,
    pub calendar_path: String,

    /// Submission timeout in seconds. The reply stream has no total limit.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            email_path: DEFAULT_EMAIL_PATH.to_string(),
            calendar_path: DEFAULT_CALENDAR_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    /// Join the base URL and an endpoint path, tolerating stray slashes
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Sender identity attached to outgoing emails and events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// What to do with records of an unknown type
    pub unknown_records: UnknownRecordPolicy,

    /// Events buffered between the reader task and the consumer
    pub channel_capacity: usize,

    /// Seconds without a chunk before the stream is failed; 0 waits forever
    pub idle_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            unknown_records: UnknownRecordPolicy::Literal,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset ("info", "debug", "aula=trace", ...)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Validate configuration and return helpful errors
    pub fn validate(&self) -> anyhow::Result<()> {
        let base_url = self.backend.base_url.trim();
        if base_url.is_empty() {
            anyhow::bail!(
                "No backend configured. Set `backend.base_url` in ~/.aula/config.toml \
                 or export AULA_BASE_URL=\"https://...\""
            );
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            anyhow::bail!(
                "backend.base_url must start with http:// or https:// (got '{}')",
                base_url
            );
        }
        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be greater than zero");
        }
        if self.stream.channel_capacity == 0 {
            anyhow::bail!("stream.channel_capacity must be greater than zero");
        }
        Ok(())
    }
}
