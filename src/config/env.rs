use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    /// The single operator every notification is delivered to.
    pub owner_chat_id: i64,
    pub mail: MailApiConfig,
    pub poller: PollerConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    /// Timestamps in notifications are rendered in this zone.
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct MailApiConfig {
    pub api_base: Url,
    pub client_key: String,
    /// Per-request bound so one stalled upstream fetch cannot hold a tick.
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_period: Duration,
    /// Minimum gap between two notifications for the same mailbox; zero
    /// disables the suppression entirely.
    pub cooldown: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
    pub state_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
