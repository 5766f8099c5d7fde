//! # External Secrets Check
//!
//! Health check for external-secrets operators, run as a short-lived pod by
//! the health aggregator.
//!
//! ## Overview
//!
//! Each run creates the ExternalSecret from
//! `KH_CHECK_EXTERNAL_SECRETS_MANIFEST_PATH`, waits for the operator to
//! produce the Secret of the same name, cleans both up and reports the
//! verdict to `KH_REPORTING_URL`. The run is abandoned at
//! `KH_CHECK_RUN_DEADLINE`.
//!
//! Exit status is 0 only for a verified, reported success.

use anyhow::{Context, Result};
use clap::Parser;
use external_secrets_check::cli::Args;
use external_secrets_check::config::{CheckConfig, LogSettings};
use external_secrets_check::{observability, runtime};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Subscriber first so configuration fallbacks are logged
    let mut logging = LogSettings::from_env();
    args.apply_logging(&mut logging);
    observability::init_tracing(&logging).context("Failed to initialize logging")?;

    // Configure rustls crypto provider before any kube or reqwest client exists
    runtime::install_crypto_provider();

    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let mut config = CheckConfig::from_env();
    args.apply(&mut config);

    let exit = runtime::run(config).await;
    if exit.code() != 0 {
        error!(?exit, "Check did not pass");
    }

    // Exit right away; an abandoned run must not hold the process open
    std::process::exit(exit.code());
}
