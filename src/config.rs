//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Delivery queue tuning for the processor sweep.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Maximum jobs claimed by a single sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Attempts before a job is frozen in `failed` (per-job override allowed).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay added to `scheduled_for` after a retryable failure.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_seconds: u64,
    /// Jobs due within this margin of "now" are picked up early.
    #[serde(default = "default_safety_margin")]
    pub safety_margin_seconds: u64,
    /// Age after which a `processing` claim is considered abandoned.
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_seconds: u64,
    /// Upper bound on a single gateway request.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
    /// Lower bound of the randomized pause between two sends.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Upper bound of the randomized pause between two sends.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            retry_backoff_seconds: default_retry_backoff(),
            safety_margin_seconds: default_safety_margin(),
            claim_timeout_seconds: default_claim_timeout(),
            send_timeout_seconds: default_send_timeout(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_batch_size() -> u32 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    300
}

fn default_safety_margin() -> u64 {
    60
}

fn default_claim_timeout() -> u64 {
    600
}

fn default_send_timeout() -> u64 {
    30
}

fn default_min_delay_ms() -> u64 {
    3000
}

fn default_max_delay_ms() -> u64 {
    8000
}

/// Automation trigger settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AutomationConfig {
    /// Local hour (0-23) at which pre-checkout messages are released.
    #[serde(default = "default_checkout_cutoff_hour")]
    pub checkout_cutoff_hour: u32,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            checkout_cutoff_hour: default_checkout_cutoff_hour(),
        }
    }
}

fn default_checkout_cutoff_hour() -> u32 {
    18
}

/// Webhook reconciliation settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReconcileConfig {
    /// Window in which an identical outbound event is treated as an echo.
    #[serde(default = "default_echo_window")]
    pub echo_window_seconds: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            echo_window_seconds: default_echo_window(),
        }
    }
}

fn default_echo_window() -> u64 {
    30
}

/// In-process sweep cadence, used when no external scheduler drives the
/// sweep endpoints.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ScheduleConfig {
    /// Whether `serve` runs the sweeps itself.
    #[serde(default)]
    pub enabled: bool,
    /// Interval between queue sweeps.
    #[serde(default = "default_queue_interval")]
    pub queue_interval_seconds: u64,
    /// Interval between automation sweeps.
    #[serde(default = "default_daily_interval")]
    pub daily_interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_interval_seconds: default_queue_interval(),
            daily_interval_hours: default_daily_interval(),
        }
    }
}

fn default_queue_interval() -> u64 {
    120
}

fn default_daily_interval() -> u64 {
    24
}

/// Upper bound for `schedule.daily_interval_hours` (one year).
const MAX_DAILY_INTERVAL_HOURS: u64 = 24 * 366;

fn default_database_path() -> PathBuf {
    PathBuf::from("data/hostline.db")
}

fn default_http_port() -> u16 {
    8080
}

fn default_timezone() -> String {
    "UTC".into()
}

fn default_retention_days() -> u32 {
    365
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// HTTP port for webhooks and sweep triggers.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// IANA zone used for tenants without their own.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    /// Days after which finished messages are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Delivery queue tuning.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Automation trigger settings.
    #[serde(default)]
    pub automation: AutomationConfig,
    /// Webhook reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Embedded sweep cadence.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Bearer token guarding sweep and queue endpoints (populated at runtime).
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the API bearer token from OS keychain with env-var fallback.
    ///
    /// A missing token is not fatal: the protected endpoints then reject
    /// every request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain task panics.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.api_token = load_credential("api_token", "HOSTLINE_API_TOKEN").await?;
        if self.api_token.is_none() {
            warn!("no api token configured; sweep and queue endpoints will reject all requests");
        }
        Ok(())
    }

    /// Parsed fallback time zone.
    ///
    /// `validate` guarantees the configured name parses; UTC is returned
    /// for a config built without validation.
    #[must_use]
    pub fn default_tz(&self) -> Tz {
        self.default_timezone.parse::<Tz>().unwrap_or(Tz::UTC)
    }

    fn validate(&self) -> Result<()> {
        if self.queue.batch_size == 0 {
            return Err(AppError::Config(
                "queue.batch_size must be greater than zero".into(),
            ));
        }

        if self.queue.max_attempts == 0 {
            return Err(AppError::Config(
                "queue.max_attempts must be greater than zero".into(),
            ));
        }

        if self.queue.min_delay_ms > self.queue.max_delay_ms {
            return Err(AppError::Config(
                "queue.min_delay_ms must not exceed queue.max_delay_ms".into(),
            ));
        }

        if self.automation.checkout_cutoff_hour > 23 {
            return Err(AppError::Config(
                "automation.checkout_cutoff_hour must be between 0 and 23".into(),
            ));
        }

        if self.default_timezone.parse::<Tz>().is_err() {
            return Err(AppError::Config(format!(
                "default_timezone is not a known IANA zone: {}",
                self.default_timezone
            )));
        }

        if self.schedule.queue_interval_seconds == 0 || self.schedule.daily_interval_hours == 0 {
            return Err(AppError::Config(
                "schedule intervals must be greater than zero".into(),
            ));
        }

        if self.schedule.daily_interval_hours > MAX_DAILY_INTERVAL_HOURS {
            return Err(AppError::Config(format!(
                "schedule.daily_interval_hours must not exceed {MAX_DAILY_INTERVAL_HOURS}"
            )));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new("hostline", &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    Ok(env::var(env_key).ok().filter(|value| !value.is_empty()))
}
