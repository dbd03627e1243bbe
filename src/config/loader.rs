use std::{env, time::Duration};

use chrono_tz::Tz;
use url::Url;

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, LoggingConfig, MailApiConfig, PollerConfig,
};

const DEFAULT_API_BASE: &str = "https://gapi.hotmail007.com/v1/mail/getFirstMail";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let owner_chat_id = env::var("OWNER_CHAT_ID")
            .map_err(|_| ConfigError::Missing("OWNER_CHAT_ID"))?
            .trim()
            .parse::<i64>()
            .map_err(|err| ConfigError::Invalid("OWNER_CHAT_ID", err.to_string()))?;

        let client_key =
            env::var("MAIL_CLIENT_KEY").map_err(|_| ConfigError::Missing("MAIL_CLIENT_KEY"))?;

        let api_base = env::var("MAIL_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let api_base = Url::parse(&api_base)
            .map_err(|err| ConfigError::Invalid("MAIL_API_BASE", err.to_string()))?;

        let poll_period_ms = parse_ms("POLL_PERIOD_MS", 5_000)?;
        if poll_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "POLL_PERIOD_MS",
                "must be a positive number of milliseconds".to_string(),
            ));
        }
        let cooldown_ms = parse_ms("NOTIFY_COOLDOWN_MS", 15_000)?;
        let fetch_timeout_ms = parse_ms("FETCH_TIMEOUT_MS", 10_000)?;

        let mail = MailApiConfig {
            api_base,
            client_key,
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
        };

        let poller = PollerConfig {
            poll_period: Duration::from_millis(poll_period_ms),
            cooldown: Duration::from_millis(cooldown_ms),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            db_filename: env::var("DB_FILENAME").unwrap_or_else(|_| "mailboxes.db".to_string()),
            state_filename: env::var("STATE_FILENAME").unwrap_or_else(|_| "seen.json".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let timezone = parse_timezone(&env::var("BOT_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()))?;

        Ok(Self {
            telegram_bot_token,
            owner_chat_id,
            mail,
            poller,
            directories,
            logging,
            timezone,
        })
    }
}

fn parse_ms(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|err| ConfigError::Invalid(key, err.to_string())),
    }
}

/// A bad zone name is a startup error, not a silent UTC fallback.
fn parse_timezone(raw: &str) -> Result<Tz, ConfigError> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|err| ConfigError::Invalid("BOT_TIMEZONE", err.to_string()))
}
