//! # Runtime
//!
//! Wires configuration, clients, the check and the watchdog together.

use crate::check::{execute, Check, CheckSettings};
use crate::client::{connect, KubeResourceClient};
use crate::config::CheckConfig;
use crate::manifest;
use crate::outcome::RunExit;
use crate::reporter::KuberhealthyReporter;
use crate::watchdog::{supervise, termination_signal};
use anyhow::{Context, Result};
use tracing::{error, info, warn};

/// Install the rustls crypto provider
///
/// Required for rustls 0.23+ when no default provider is set via features.
/// Must run before any kube or reqwest client is built.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }
}

/// Resolve the manifest and the Kubernetes client
///
/// This is the check's Init phase; any error here fails the run with
/// "setup failed".
pub async fn initialize(config: &CheckConfig) -> Result<Check<KubeResourceClient>> {
    let descriptor = manifest::load(&config.manifest_path)
        .context("Failed to load ExternalSecret manifest")?
        .in_namespace(&config.namespace);

    let client = connect()
        .await
        .context("Failed to resolve cluster configuration")?;
    let resources = KubeResourceClient::new(
        client,
        &config.namespace,
        descriptor.api_resource(),
        config.request_timeout(),
    );

    let settings = CheckSettings {
        poll: config.poll_backoff(),
        settle_delay: config.settle_delay(),
    };
    Ok(Check::new(resources, descriptor, settings))
}

/// Run one check under the watchdog and return how the process should exit
pub async fn run(config: CheckConfig) -> RunExit {
    info!(
        namespace = %config.namespace,
        manifest = %config.manifest_path.display(),
        deadline = %config.deadline,
        "Starting external secrets check"
    );

    let reporter =
        match KuberhealthyReporter::new(config.reporting_url.clone(), config.run_uuid.clone()) {
            Ok(reporter) => reporter,
            Err(e) => {
                error!("Failed to build reporting client: {}", e);
                return RunExit::Fault;
            }
        };

    let deadline = config.deadline;
    let check = async move { execute(initialize(&config), reporter).await };

    supervise(check, deadline, termination_signal()).await
}
