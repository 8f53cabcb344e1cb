//! Service configuration management

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, Weekday};
use config::{Config, Environment, File, FileFormat};
use pool_engine::season::season_start_year;
use pool_engine::PayoutRules;
use pool_store::DatabaseConfig;
use scores_fetcher::FeedConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::logging::{validate_level, LogFormat};

/// Environment prefix, e.g. `POOL_DATABASE__URL`
pub const ENV_PREFIX: &str = "POOL";

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Score feed configuration
    pub feed: FeedConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Payout amounts
    pub rules: PayoutRules,

    /// Season selection and roster checks
    pub season: SeasonConfig,

    /// Scheduler configuration
    pub schedule: ScheduleConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    /// Season to settle; derived from today's date when unset
    pub season_start_year: Option<i32>,

    /// Exact number of owners a roster must have to be seeded
    pub expected_owner_count: Option<usize>,
}

impl SeasonConfig {
    pub fn resolve_start_year(&self, today: NaiveDate) -> i32 {
        self.season_start_year.unwrap_or_else(|| season_start_year(today))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Day of week for settlement (e.g. "Tue")
    pub weekday: String,

    /// Settlement time (HH:MM format, UTC)
    pub time_utc: String,

    /// Minutes between settlement and the reconciliation pass
    pub reconcile_delay_minutes: u64,

    /// Retry configuration
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_retries: u32,

    /// Initial retry delay in seconds
    pub initial_delay_secs: u64,

    /// Maximum retry delay in seconds
    pub max_delay_secs: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekday: "Tue".to_string(),
            time_utc: "06:00".to_string(),
            reconcile_delay_minutes: 5,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, initial_delay_secs: 30, max_delay_secs: 600, backoff_multiplier: 2.0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl ScheduleConfig {
    pub fn weekday(&self) -> Result<Weekday> {
        self.weekday
            .parse::<Weekday>()
            .map_err(|_| anyhow::anyhow!("Invalid schedule weekday: {}", self.weekday))
    }

    pub fn time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.time_utc, "%H:%M")
            .with_context(|| format!("Invalid schedule time: {}", self.time_utc))
    }
}

impl ServiceConfig {
    /// Load configuration from the optional file, `POOL_*` variables and `DATABASE_URL`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_sources(path, ENV_PREFIX)?;

        let pool_url_set = std::env::var(format!("{}_DATABASE__URL", ENV_PREFIX)).is_ok();
        if !pool_url_set {
            if let Ok(db_url) = std::env::var("DATABASE_URL") {
                config.database.url = db_url;
            }
        }

        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Layer a TOML file under environment variables with the given prefix
    pub fn from_sources(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            tracing::debug!("Loading configuration from file: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.feed.validate()?;
        self.database.validate()?;
        self.rules.validate()?;

        validate_level(&self.logging.level)?;
        self.logging.format.parse::<LogFormat>()?;

        self.schedule.weekday().map_err(|e| e.to_string())?;
        self.schedule.time().map_err(|e| e.to_string())?;

        let retry = &self.schedule.retry;
        if retry.max_retries == 0 {
            return Err("schedule retry max_retries must be > 0".to_string());
        }
        if retry.backoff_multiplier < 1.0 {
            return Err("schedule retry backoff_multiplier must be >= 1.0".to_string());
        }

        Ok(())
    }
}
