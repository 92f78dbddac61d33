//! Configuration of the network client, the session tracker and the proof validator.
//!
//! Every config has SDK defaults and can be loaded from JSON, e.g. when a host
//! application keeps its settings in a remote config service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{defaults, error::ReclaimError};

/// Endpoints of the verification network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    /// Base URL of the backend REST API (sessions, providers, URL shortener).
    pub backend_url: String,
    /// Request front-end URL prefix.
    pub share_url: String,
    /// App Clip URL prefix.
    pub app_clip_url: String,
    /// Shorten request URLs through the backend before handing them out.
    pub shorten_urls: bool,
    /// Allow plain `http` endpoints. Only meant for local development.
    pub allow_insecure_http: bool,
    /// Timeouts and retries of backend calls.
    pub retry: RetryConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            backend_url: defaults::BACKEND_BASE_URL.to_string(),
            share_url: defaults::RECLAIM_SHARE_URL.to_string(),
            app_clip_url: defaults::APP_CLIP_URL.to_string(),
            shorten_urls: true,
            allow_insecure_http: false,
            retry: RetryConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Builds a config pointing at a custom backend, keeping the other defaults.
    #[must_use]
    pub fn with_backend_url(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            ..Self::default()
        }
    }

    /// Parses a config from JSON. Missing fields take their default value.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self, ReclaimError> {
        from_json(json, "network_config")
    }
}

/// Timeouts and retries of backend calls.
///
/// Rate limited requests, server errors, timeouts and connection failures are retried
/// with exponential backoff between `min_backoff_ms` and `max_backoff_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Timeout of a single attempt, in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: defaults::DEFAULT_MAX_RETRIES,
            min_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

/// Polling behaviour of a session tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollingConfig {
    /// Delay between two polls of the status endpoint, in milliseconds.
    pub interval_ms: u64,
    /// Polls before a session without a terminal report is expired.
    pub max_polls: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: defaults::DEFAULT_POLL_INTERVAL_MS,
            max_polls: defaults::DEFAULT_MAX_POLLS,
        }
    }
}

impl PollingConfig {
    /// Builds a polling config.
    ///
    /// # Errors
    /// Returns `InvalidInput` if `interval_ms` is zero.
    pub fn new(interval_ms: u64, max_polls: u32) -> Result<Self, ReclaimError> {
        let config = Self {
            interval_ms,
            max_polls,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ReclaimError> {
        if self.interval_ms == 0 {
            return Err(ReclaimError::InvalidInput {
                attribute: "polling_config".to_string(),
                reason: "intervalMs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Delay between two polls, at least one millisecond.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// Total time a session is tracked before it expires.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.interval_ms.saturating_mul(self.max_polls as u64))
    }

    /// Parses a config from JSON. Missing fields take their default value.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the JSON is invalid or `intervalMs` is zero.
    pub fn from_json(json: &str) -> Result<Self, ReclaimError> {
        let config: Self = from_json(json, "polling_config")?;
        config.validate()?;
        Ok(config)
    }
}

/// Freshness rules applied by the proof validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorConfig {
    /// Accepted clock drift, in seconds.
    pub max_clock_skew_secs: u64,
    /// Maximum claim age at validation time, in seconds.
    pub max_proof_age_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_clock_skew_secs: defaults::DEFAULT_MAX_CLOCK_SKEW_SECS,
            max_proof_age_secs: defaults::DEFAULT_MAX_PROOF_AGE_SECS,
        }
    }
}

impl ValidatorConfig {
    /// Parses a config from JSON. Missing fields take their default value.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self, ReclaimError> {
        from_json(json, "validator_config")
    }
}

fn from_json<T: for<'de> Deserialize<'de>>(
    json: &str,
    attribute: &str,
) -> Result<T, ReclaimError> {
    serde_json::from_str(json).map_err(|e| ReclaimError::InvalidInput {
        attribute: attribute.to_string(),
        reason: e.to_string(),
    })
}
