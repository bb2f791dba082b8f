//! Configuration types.
//!
//! Everything is read once at startup into [`NotifierConfig`] and passed
//! into the pipeline explicitly. Missing required values fail fast.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use secrecy::SecretString;

use crate::error::ConfigError;

pub const ENV_API_URL: &str = "API_URL";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_HISTORY_TABLE: &str = "EMAILS_DYNAMODB_TABLE_NAME";
pub const ENV_QUEUE_URL: &str = "SQS_QUEUE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "NOTIFY_REQUEST_TIMEOUT_SECS";
pub const ENV_MAX_CONCURRENCY: &str = "NOTIFY_MAX_CONCURRENCY";
pub const ENV_MAX_NOTIFICATIONS: &str = "NOTIFY_MAX_NOTIFICATIONS";
pub const ENV_COOLDOWN_HOURS: &str = "NOTIFY_COOLDOWN_HOURS";
pub const ENV_HISTORY_DB_PATH: &str = "NOTIFY_HISTORY_DB_PATH";
pub const ENV_RUN_DEADLINE_SECS: &str = "NOTIFY_RUN_DEADLINE_SECS";

/// Default timeout for upstream fetches, store calls and queue publishes.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default history database location.
const DEFAULT_HISTORY_DB_PATH: &str = "./data/claim-history.db";

/// Throttling policy: how many notifications a claim may ever receive and
/// how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Hard cap on notifications per claim.
    pub max_notifications: usize,
    /// Minimum time between consecutive notifications.
    pub cooldown: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_notifications: 2,
            cooldown: Duration::from_secs(168 * 3600), // one week
        }
    }
}

/// Notifier configuration.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Upstream endpoint returning the claim list.
    pub api_url: String,
    /// API key sent in the `x-api-key` header.
    pub api_key: SecretString,
    /// History table name.
    pub history_table: String,
    /// Delivery queue destination.
    pub queue_destination: String,
    /// Bound on every network or store operation.
    pub request_timeout: Duration,
    /// Number of claims processed at once. 1 means sequential.
    pub max_concurrent_claims: usize,
    pub policy: ThrottlePolicy,
    /// Local libSQL database holding the history table.
    pub history_db_path: PathBuf,
    /// Stop starting new claims once this much time has passed.
    pub run_deadline: Option<Duration>,
}

impl NotifierConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let api_url = required(ENV_API_URL)?;
        let api_key = SecretString::from(required(ENV_API_KEY)?);
        let history_table = required(ENV_HISTORY_TABLE)?;
        let queue_destination = required(ENV_QUEUE_URL)?;
        validate_table_name(&history_table)?;

        let timeout_secs: u64 = parse_positive(
            &lookup,
            ENV_REQUEST_TIMEOUT_SECS,
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let max_concurrent_claims: usize = parse_positive(&lookup, ENV_MAX_CONCURRENCY, 1)?;

        let defaults = ThrottlePolicy::default();
        let max_notifications: usize =
            parse_positive(&lookup, ENV_MAX_NOTIFICATIONS, defaults.max_notifications)?;
        let cooldown_hours: u64 = parse_positive(
            &lookup,
            ENV_COOLDOWN_HOURS,
            defaults.cooldown.as_secs() / 3600,
        )?;

        let history_db_path = lookup(ENV_HISTORY_DB_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DB_PATH));

        // The decision engine compares in signed seconds.
        let cooldown = cooldown_hours
            .checked_mul(3600)
            .filter(|secs| i64::try_from(*secs).is_ok())
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: ENV_COOLDOWN_HOURS.to_string(),
                message: format!("{cooldown_hours} hours is out of range"),
            })?;

        let run_deadline = match lookup(ENV_RUN_DEADLINE_SECS).filter(|v| !v.trim().is_empty()) {
            Some(_) => {
                let budget =
                    Duration::from_secs(parse_positive(&lookup, ENV_RUN_DEADLINE_SECS, 0u64)?);
                if Instant::now().checked_add(budget).is_none() {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_RUN_DEADLINE_SECS.to_string(),
                        message: format!("{}s is out of range", budget.as_secs()),
                    });
                }
                Some(budget)
            }
            None => None,
        };

        Ok(Self {
            api_url,
            api_key,
            history_table,
            queue_destination,
            request_timeout: Duration::from_secs(timeout_secs),
            max_concurrent_claims,
            policy: ThrottlePolicy {
                max_notifications,
                cooldown,
            },
            history_db_path,
            run_deadline,
        })
    }
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,127}$").unwrap());

/// Check that a table name can be spliced into SQL as a bare identifier.
pub fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: ENV_HISTORY_TABLE.to_string(),
            message: format!("{name:?} is not a plain table identifier"),
        })
    }
}

/// Parse an optional numeric setting that must be greater than zero.
fn parse_positive<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".into(),
        });
    }
    Ok(value)
}
