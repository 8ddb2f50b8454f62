//! Ingestion configuration
//!
//! Everything is read from the environment (after loading `.env`). The two
//! remote endpoints are required; retry, working-set and scheduling knobs
//! have defaults.

use hn_common::error::{env_or, require_env};
use hn_common::{HnError, Result};
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Attempts per remote fetch before giving up.
pub const DEFAULT_FETCH_MAX_RETRIES: u32 = 5;

/// Base of the exponential backoff, in seconds.
pub const DEFAULT_BACKOFF_FACTOR_SECS: f64 = 1.0;

/// Per-attempt HTTP timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Number of top ids processed per run.
pub const DEFAULT_WORKING_SET_SIZE: usize = 100;

/// Attempts per error-log write.
pub const DEFAULT_ERROR_LOG_MAX_RETRIES: u32 = 3;

/// Fixed delay between error-log write attempts, in seconds.
pub const DEFAULT_ERROR_LOG_RETRY_DELAY_SECS: u64 = 1;

/// Interval between scheduled runs (one hour).
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Retry behaviour for remote fetches.
///
/// Attempt `n` (counted from 0) that fails waits `backoff_factor * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_factor
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_FETCH_MAX_RETRIES,
            backoff_factor: Duration::from_secs_f64(DEFAULT_BACKOFF_FACTOR_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Retry behaviour for error-log writes: fixed delay, no growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLogPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ErrorLogPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_ERROR_LOG_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_ERROR_LOG_RETRY_DELAY_SECS),
        }
    }
}

/// Detail endpoint URL with an id placeholder (`{}` or `{id}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUrlTemplate(String);

impl ItemUrlTemplate {
    const PLACEHOLDERS: [&'static str; 2] = ["{id}", "{}"];

    pub fn parse(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if Self::PLACEHOLDERS.iter().any(|p| template.contains(p)) {
            Ok(Self(template))
        } else {
            Err(HnError::config(format!(
                "ITEM_URL must contain an id placeholder ('{{}}' or '{{id}}'): {}",
                template
            )))
        }
    }

    pub fn render(&self, id: i64) -> String {
        let id = id.to_string();
        Self::PLACEHOLDERS
            .iter()
            .fold(self.0.clone(), |url, placeholder| url.replace(placeholder, &id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Main ingestion configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub top_stories_url: String,
    pub item_url: ItemUrlTemplate,
    pub retry: RetryPolicy,
    pub error_log: ErrorLogPolicy,
    pub working_set_size: usize,
    pub interval: Duration,
}

impl IngestConfig {
    /// Build a configuration with default policies for the given endpoints.
    pub fn new(top_stories_url: impl Into<String>, item_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            top_stories_url: top_stories_url.into(),
            item_url: ItemUrlTemplate::parse(item_url)?,
            retry: RetryPolicy::default(),
            error_log: ErrorLogPolicy::default(),
            working_set_size: DEFAULT_WORKING_SET_SIZE,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
        })
    }

    /// Load from environment variables.
    ///
    /// Required: `TOP_STORIES_URL`, `ITEM_URL`. Optional: `ETL_MAX_RETRIES`,
    /// `ETL_BACKOFF_FACTOR_SECS`, `ETL_REQUEST_TIMEOUT_SECS`,
    /// `ETL_WORKING_SET_SIZE`, `ETL_ERROR_LOG_MAX_RETRIES`,
    /// `ETL_ERROR_LOG_RETRY_DELAY_SECS`, `ETL_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let backoff_secs: f64 = env_or("ETL_BACKOFF_FACTOR_SECS", DEFAULT_BACKOFF_FACTOR_SECS)?;
        let backoff_factor = Duration::try_from_secs_f64(backoff_secs).map_err(|_| {
            HnError::InvalidEnv {
                name: "ETL_BACKOFF_FACTOR_SECS".to_string(),
                value: backoff_secs.to_string(),
            }
        })?;

        let config = Self {
            top_stories_url: require_env("TOP_STORIES_URL")?,
            item_url: ItemUrlTemplate::parse(require_env("ITEM_URL")?)?,
            retry: RetryPolicy {
                max_retries: env_or("ETL_MAX_RETRIES", DEFAULT_FETCH_MAX_RETRIES)?,
                backoff_factor,
                request_timeout: Duration::from_secs(env_or(
                    "ETL_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?),
            },
            error_log: ErrorLogPolicy {
                max_retries: env_or("ETL_ERROR_LOG_MAX_RETRIES", DEFAULT_ERROR_LOG_MAX_RETRIES)?,
                retry_delay: Duration::from_secs(env_or(
                    "ETL_ERROR_LOG_RETRY_DELAY_SECS",
                    DEFAULT_ERROR_LOG_RETRY_DELAY_SECS,
                )?),
            },
            working_set_size: env_or("ETL_WORKING_SET_SIZE", DEFAULT_WORKING_SET_SIZE)?,
            interval: Duration::from_secs(env_or("ETL_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_stories_url.trim().is_empty() {
            return Err(HnError::config("TOP_STORIES_URL cannot be empty"));
        }
        if self.retry.max_retries == 0 {
            return Err(HnError::config("ETL_MAX_RETRIES must be greater than 0"));
        }
        if self.retry.request_timeout.is_zero() {
            return Err(HnError::config("ETL_REQUEST_TIMEOUT_SECS must be greater than 0"));
        }
        if self.error_log.max_retries == 0 {
            return Err(HnError::config("ETL_ERROR_LOG_MAX_RETRIES must be greater than 0"));
        }
        if self.interval.is_zero() {
            return Err(HnError::config("ETL_INTERVAL_SECS must be greater than 0"));
        }
        Ok(())
    }
}
