//! # Check Configuration
//!
//! Run-level settings loaded from environment variables and the pod's
//! service account mount. The aggregator injects `KH_*` variables into the
//! check pod; everything else has a default in [`crate::constants`].
//!
//! The configuration is built once at startup and handed to every component
//! explicitly. Nothing reads it through a global.

use crate::backoff::ConstantBackoff;
use crate::constants::{
    DEFAULT_DEADLINE_SECS, DEFAULT_MANIFEST_PATH, DEFAULT_NAMESPACE, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_POLL_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SETTLE_DELAY_SECS,
    SERVICE_ACCOUNT_NAMESPACE_PATH,
};
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const MANIFEST_PATH_ENV: &str = "KH_CHECK_EXTERNAL_SECRETS_MANIFEST_PATH";
pub const NAMESPACE_ENV: &str = "CHECK_NAMESPACE";
pub const DEADLINE_ENV: &str = "KH_CHECK_RUN_DEADLINE";
pub const REPORTING_URL_ENV: &str = "KH_REPORTING_URL";
pub const RUN_UUID_ENV: &str = "KH_RUN_UUID";

/// Check configuration
///
/// Timing knobs default to the values the check has always used; they are
/// exposed so slow operators can be given more headroom without a rebuild.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Namespace the ExternalSecret and its Secret live in
    pub namespace: String,
    /// Path to the ExternalSecret manifest
    pub manifest_path: PathBuf,
    /// Absolute time after which the run is abandoned
    pub deadline: DateTime<Utc>,
    /// Timeout applied to every Kubernetes API call (seconds)
    pub request_timeout_secs: u64,
    /// Constant interval between Secret lookups (seconds)
    pub poll_interval_secs: u64,
    /// Total Secret lookups before giving up
    pub poll_max_attempts: u32,
    /// Pause after pre-flight cleanup (seconds)
    pub settle_delay_secs: u64,
    /// Aggregator endpoint for the verdict
    pub reporting_url: Option<String>,
    /// Run identifier echoed back to the aggregator
    pub run_uuid: String,
}

/// Logging settings
///
/// Resolved separately from [`CheckConfig`] so the subscriber is installed
/// before configuration loading emits its fallback notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub level: String,
    /// Log format (text, json)
    pub format: String,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            level: var_or_default_str(&lookup, "LOG_LEVEL", "INFO"),
            format: var_or_default_str(&lookup, "LOG_FORMAT", "text"),
        }
    }
}

impl CheckConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(
            |key| std::env::var(key).ok(),
            Path::new(SERVICE_ACCOUNT_NAMESPACE_PATH),
            Utc::now(),
        )
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F, namespace_file: &Path, now: DateTime<Utc>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let manifest_path = lookup(MANIFEST_PATH_ENV)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| {
                info!(
                    "{} not set, defaulting manifest path to {}",
                    MANIFEST_PATH_ENV, DEFAULT_MANIFEST_PATH
                );
                DEFAULT_MANIFEST_PATH.to_string()
            });

        let namespace = lookup(NAMESPACE_ENV)
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| resolve_namespace(namespace_file));

        let deadline = resolve_deadline(lookup(DEADLINE_ENV).as_deref(), now);

        Self {
            namespace,
            manifest_path: PathBuf::from(manifest_path),
            deadline,
            request_timeout_secs: var_or_default(
                &lookup,
                "CHECK_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            poll_interval_secs: var_or_default(
                &lookup,
                "CHECK_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            ),
            poll_max_attempts: var_or_default(
                &lookup,
                "CHECK_POLL_MAX_ATTEMPTS",
                DEFAULT_POLL_MAX_ATTEMPTS,
            ),
            settle_delay_secs: var_or_default(
                &lookup,
                "CHECK_SETTLE_DELAY_SECS",
                DEFAULT_SETTLE_DELAY_SECS,
            ),
            reporting_url: lookup(REPORTING_URL_ENV).filter(|u| !u.is_empty()),
            run_uuid: lookup(RUN_UUID_ENV).unwrap_or_default(),
        }
    }

    /// Get request timeout duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get settle delay duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    /// Backoff used while waiting for the operator to create the Secret
    pub fn poll_backoff(&self) -> ConstantBackoff {
        ConstantBackoff::new(
            Duration::from_secs(self.poll_interval_secs),
            self.poll_max_attempts,
        )
    }
}

/// Read the namespace from the service account mount, falling back to the default
fn resolve_namespace(namespace_file: &Path) -> String {
    match std::fs::read_to_string(namespace_file) {
        Ok(contents) if !contents.trim().is_empty() => {
            let namespace = contents.trim().to_string();
            info!(
                "Using namespace {} from {}",
                namespace,
                namespace_file.display()
            );
            namespace
        }
        _ => {
            info!("Using default namespace {}", DEFAULT_NAMESPACE);
            DEFAULT_NAMESPACE.to_string()
        }
    }
}

/// Parse the aggregator's unix-seconds deadline, defaulting to now + 120s
fn resolve_deadline(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = raw
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    if let Some(deadline) = parsed {
        return deadline;
    }

    if let Some(value) = raw {
        warn!("Ignoring unparseable {} value {:?}", DEADLINE_ENV, value);
    }
    let fallback = chrono::Duration::from_std(Duration::from_secs(DEFAULT_DEADLINE_SECS))
        .unwrap_or_else(|_| chrono::Duration::zero());
    info!("Using default deadline now + {}s", DEFAULT_DEADLINE_SECS);
    now + fallback
}

/// Read variable or return default value
fn var_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read variable as string or return default
fn var_or_default_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}
