// Engine configuration loaded from environment variables.
//
// Every knob has a default so the CLI runs with an empty environment; a
// `.env` file in the working directory is honoured for local tweaking.

use crate::error::{EngineError, Result};
use crate::retry::RetryPolicy;
use crate::running::RunningLimits;
use crate::trace::{PaceModel, Track};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Engine configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform root, without trailing slash
    pub base_url: String,
    /// Upper bound on every network round-trip
    pub request_timeout: Duration,
    /// Retry budget for idempotent reads and single run updates
    pub retry: RetryPolicy,
    /// Speed band and distribution for synthesized traces
    pub pace: PaceModel,
    /// Track the synthesized trace is laid out on
    pub track: Track,
    /// Trace samples carried by one update call
    pub batch_size: usize,
    /// Fixed RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Distance limits used when the platform does not report its own
    pub default_limits: RunningLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://cpes.legym.cn".to_string(),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            pace: PaceModel::default(),
            track: Track::default(),
            batch_size: 20,
            seed: None,
            default_limits: RunningLimits::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let backoff_ms: u64 = parse(&lookup, "LEGYM_BACKOFF_MS")?
            .unwrap_or(defaults.retry.initial_backoff.as_millis() as u64);
        let retry = RetryPolicy {
            max_attempts: parse(&lookup, "LEGYM_MAX_ATTEMPTS")?
                .unwrap_or(defaults.retry.max_attempts),
            initial_backoff: Duration::from_millis(backoff_ms),
            max_backoff: Duration::from_millis(backoff_ms.saturating_mul(8)),
        };

        let pace = PaceModel {
            min_speed_mps: parse(&lookup, "LEGYM_MIN_SPEED")?
                .unwrap_or(defaults.pace.min_speed_mps),
            max_speed_mps: parse(&lookup, "LEGYM_MAX_SPEED")?
                .unwrap_or(defaults.pace.max_speed_mps),
            mean_speed_mps: parse(&lookup, "LEGYM_MEAN_SPEED")?
                .unwrap_or(defaults.pace.mean_speed_mps),
            speed_stddev_mps: parse(&lookup, "LEGYM_SPEED_STDDEV")?
                .unwrap_or(defaults.pace.speed_stddev_mps),
            ..defaults.pace
        };
        pace.validate()?;

        let batch_size: usize =
            parse(&lookup, "LEGYM_BATCH_SIZE")?.unwrap_or(defaults.batch_size);
        if batch_size == 0 {
            return Err(EngineError::Config(
                "LEGYM_BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            base_url: lookup("LEGYM_BASE_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            request_timeout: Duration::from_secs(
                parse(&lookup, "LEGYM_TIMEOUT_SECS")?.unwrap_or(10),
            ),
            retry,
            pace,
            track: defaults.track,
            batch_size,
            seed: parse(&lookup, "LEGYM_SEED")?,
            default_limits: defaults.default_limits,
        })
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EngineError::Config(format!("{key} has invalid value {raw:?}"))),
    }
}
