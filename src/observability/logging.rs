//! # Logging
//!
//! Installs the global tracing subscriber.
//!
//! `RUST_LOG` takes precedence when set. Otherwise the configured log level
//! applies to this crate only, keeping kube and hyper quiet.

use crate::config::LogSettings;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Default filter directive for `level`
pub fn default_directive(level: &str) -> String {
    format!("external_secrets_check={}", level.to_lowercase())
}

/// Install the subscriber; `LOG_FORMAT=json` switches to JSON lines
pub fn init_tracing(settings: &LogSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&settings.level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if settings.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
