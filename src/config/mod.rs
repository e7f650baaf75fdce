//! Environment-driven configuration
//!
//! Values are read from the process environment (a `.env` file is loaded by
//! the binaries through `dotenvy` before `Settings::from_env` is called).

use crate::error::{AppError, AppResult};
use chrono::Weekday;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SYMBOLS: &[&str] = &["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"];

/// Deployment environment name (`ENVIRONMENT`), defaults to "sandbox"
pub fn get_environment() -> String {
    env::var("ENVIRONMENT")
        .unwrap_or_else(|_| "sandbox".to_string())
        .to_lowercase()
}

pub fn get_database_url() -> Option<String> {
    env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub market_data_provider: String,
    pub market_data_api_key: Option<String>,
    pub market_data_base_url: Option<String>,
    pub ai_provider: String,
    pub ai_api_key: Option<String>,
    pub ai_model: Option<String>,
    pub ai_base_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_base_url: Option<String>,
    /// Chats seeded into the subscription table on startup
    pub telegram_chat_ids: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            market_data_provider: "yahoofinance".to_string(),
            market_data_api_key: None,
            market_data_base_url: None,
            ai_provider: "openai".to_string(),
            ai_api_key: None,
            ai_model: None,
            ai_base_url: None,
            telegram_bot_token: None,
            telegram_base_url: None,
            telegram_chat_ids: Vec::new(),
        }
    }
}

/// Cadence and grace windows of the built-in jobs
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSettings {
    pub data_fetch_interval: Duration,
    pub data_fetch_grace: Duration,
    pub prediction_interval: Duration,
    pub prediction_grace: Duration,
    pub evaluation_hour: u32,
    pub notification_hour: u32,
    pub price_alert_interval: Duration,
    pub cleanup_weekday: Weekday,
    pub cleanup_hour: u32,
    /// Grace applied to jobs that have no dedicated window
    pub default_grace: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            data_fetch_interval: Duration::from_secs(3600),
            data_fetch_grace: Duration::from_secs(300),
            prediction_interval: Duration::from_secs(6 * 3600),
            prediction_grace: Duration::from_secs(600),
            evaluation_hour: 0,
            notification_hour: 9,
            price_alert_interval: Duration::from_secs(5 * 60),
            cleanup_weekday: Weekday::Sun,
            cleanup_hour: 2,
            default_grace: Duration::from_secs(60),
        }
    }
}

/// Inter-call delays used to stay under provider rate limits
#[derive(Debug, Clone, PartialEq)]
pub struct PacingSettings {
    pub quote_delay: Duration,
    pub prediction_delay: Duration,
    pub digest_delay: Duration,
    pub alert_chat_delay: Duration,
    pub alert_delay: Duration,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            quote_delay: Duration::from_millis(500),
            prediction_delay: Duration::from_secs(2),
            digest_delay: Duration::from_millis(500),
            alert_chat_delay: Duration::from_millis(100),
            alert_delay: Duration::from_secs(1),
        }
    }
}

impl PacingSettings {
    /// No delays, for tests and one-shot tooling
    pub fn immediate() -> Self {
        Self {
            quote_delay: Duration::ZERO,
            prediction_delay: Duration::ZERO,
            digest_delay: Duration::ZERO,
            alert_chat_delay: Duration::ZERO,
            alert_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionSettings {
    pub price_retention_days: i64,
    pub prediction_retention_days: i64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            price_retention_days: 730,
            prediction_retention_days: 365,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub environment: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub default_symbols: Vec<String>,
    pub default_alert_threshold_pct: f64,
    pub providers: ProviderSettings,
    pub schedule: ScheduleSettings,
    pub pacing: PacingSettings,
    pub retention: RetentionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            port: 8080,
            database_url: None,
            default_symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            default_alert_threshold_pct: 5.0,
            providers: ProviderSettings::default(),
            schedule: ScheduleSettings::default(),
            pacing: PacingSettings::default(),
            retention: RetentionSettings::default(),
        }
    }
}

impl Settings {
    /// Build settings from the process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let default_symbols = match get("TRACKED_SYMBOLS") {
            Some(raw) => split_list(&raw).into_iter().map(|s| s.to_uppercase()).collect(),
            None => defaults.default_symbols,
        };

        let providers = ProviderSettings {
            market_data_provider: get("MARKET_DATA_PROVIDER")
                .unwrap_or(defaults.providers.market_data_provider)
                .to_lowercase(),
            market_data_api_key: get("MARKET_DATA_API_KEY"),
            market_data_base_url: get("MARKET_DATA_BASE_URL"),
            ai_provider: get("AI_PROVIDER")
                .unwrap_or(defaults.providers.ai_provider)
                .to_lowercase(),
            ai_api_key: get("AI_API_KEY"),
            ai_model: get("AI_MODEL"),
            ai_base_url: get("AI_BASE_URL"),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_base_url: get("TELEGRAM_BASE_URL"),
            telegram_chat_ids: get("TELEGRAM_CHAT_IDS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        };

        let schedule = ScheduleSettings {
            data_fetch_interval: hours(parse_or(&get, "DATA_FETCH_INTERVAL_HOURS", 1u64)?)?,
            data_fetch_grace: seconds(parse_or(&get, "DATA_FETCH_GRACE_SECONDS", 300u64)?),
            prediction_interval: hours(parse_or(&get, "PREDICTION_INTERVAL_HOURS", 6u64)?)?,
            prediction_grace: seconds(parse_or(&get, "PREDICTION_GRACE_SECONDS", 600u64)?),
            evaluation_hour: hour_of_day(parse_or(&get, "EVALUATION_HOUR", 0u32)?)?,
            notification_hour: hour_of_day(parse_or(&get, "TELEGRAM_NOTIFICATION_HOUR", 9u32)?)?,
            price_alert_interval: minutes(parse_or(&get, "PRICE_ALERT_INTERVAL_MINUTES", 5u64)?)?,
            cleanup_weekday: match get("CLEANUP_WEEKDAY") {
                Some(raw) => Weekday::from_str(&raw).map_err(|_| {
                    AppError::Configuration(format!("CLEANUP_WEEKDAY: invalid weekday '{}'", raw))
                })?,
                None => defaults.schedule.cleanup_weekday,
            },
            cleanup_hour: hour_of_day(parse_or(&get, "CLEANUP_HOUR", 2u32)?)?,
            default_grace: seconds(parse_or(&get, "JOB_GRACE_SECONDS", 60u64)?),
        };

        let default_alert_threshold_pct = parse_or(&get, "PRICE_ALERT_THRESHOLD_PCT", 5.0f64)?;
        if !(default_alert_threshold_pct > 0.0) {
            return Err(AppError::Configuration(
                "PRICE_ALERT_THRESHOLD_PCT must be positive".to_string(),
            ));
        }

        Ok(Self {
            environment: get("ENVIRONMENT")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.environment),
            port: parse_or(&get, "PORT", defaults.port)?,
            database_url: get("DATABASE_URL"),
            default_symbols,
            default_alert_threshold_pct,
            providers,
            schedule,
            pacing: PacingSettings::default(),
            retention: RetentionSettings {
                price_retention_days: parse_or(&get, "PRICE_RETENTION_DAYS", 730i64)?,
                prediction_retention_days: parse_or(&get, "PREDICTION_RETENTION_DAYS", 365i64)?,
            },
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Configuration(format!("{}: cannot parse '{}'", key, raw))),
        None => Ok(default),
    }
}

fn hour_of_day(hour: u32) -> AppResult<u32> {
    if hour > 23 {
        return Err(AppError::Configuration(format!(
            "hour must be within 0-23, got {}",
            hour
        )));
    }
    Ok(hour)
}

fn hours(value: u64) -> AppResult<Duration> {
    non_zero(value, 3600)
}

fn minutes(value: u64) -> AppResult<Duration> {
    non_zero(value, 60)
}

fn seconds(value: u64) -> Duration {
    Duration::from_secs(value)
}

fn non_zero(value: u64, unit_secs: u64) -> AppResult<Duration> {
    if value == 0 {
        return Err(AppError::Configuration(
            "interval must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(value * unit_secs))
}
