//! # Check
//!
//! The state machine that drives one run:
//!
//! ```text
//! Init -> PreCleanup -> Create -> Validate -> PostCleanup -> Success | Failed
//! ```
//!
//! - **PreCleanup** removes leftovers from an earlier run. Its failure is not
//!   fatal; it is only reported if the run fails for another reason. A settle
//!   delay always follows so cascading deletes finish before the create.
//! - **Create** and **Validate** failures are fatal. Cleanup is attempted
//!   before the failure is reported.
//! - **PostCleanup** failure fails the run even when validation succeeded.
//!
//! A panic anywhere in the sequence is caught at [`Check::run_isolated`] and
//! becomes an "unexpected fault" failure, so the caller always gets an
//! [`Outcome`].

use crate::backoff::{poll_until, ConstantBackoff};
use crate::cleanup::cleanup;
use crate::client::{Collection, ResourceClient};
use crate::constants::reasons;
use crate::manifest::ExternalSecretDescriptor;
use crate::outcome::{CheckPhase, Outcome, RunExit};
use crate::reporter::{deliver, Reporter};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

/// Timing for one run
#[derive(Debug, Clone, Copy)]
pub struct CheckSettings {
    /// Backoff for the Secret lookup in the validate phase
    pub poll: ConstantBackoff,
    /// Pause after pre-flight cleanup
    pub settle_delay: Duration,
}

/// One check run against one ExternalSecret
#[derive(Debug)]
pub struct Check<C> {
    client: C,
    descriptor: ExternalSecretDescriptor,
    settings: CheckSettings,
    phase: CheckPhase,
    /// Non-fatal problems, surfaced only if the run fails
    auxiliary: Vec<String>,
}

impl<C: ResourceClient> Check<C> {
    pub fn new(client: C, descriptor: ExternalSecretDescriptor, settings: CheckSettings) -> Self {
        Self {
            client,
            descriptor,
            settings,
            phase: CheckPhase::Init,
            auxiliary: Vec::new(),
        }
    }

    /// Phase the run is in (or stopped in)
    pub fn phase(&self) -> CheckPhase {
        self.phase
    }

    /// Run the sequence behind the fault boundary
    pub async fn run_isolated(&mut self) -> Outcome {
        let result = AssertUnwindSafe(self.run()).catch_unwind().await;
        match result {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(
                    phase = %self.phase,
                    "Recovered panic: {}",
                    panic_message(panic.as_ref())
                );
                self.fail(reasons::UNEXPECTED_FAULT).await
            }
        }
    }

    /// Run the sequence; panics propagate, see [`Check::run_isolated`]
    pub async fn run(&mut self) -> Outcome {
        let name = self.descriptor.name().to_string();

        self.enter(CheckPhase::PreCleanup);
        let pre_cleanup = cleanup(&self.client, &name)
            .instrument(info_span!("check.phase", phase = %self.phase))
            .await;
        if let Err(e) = pre_cleanup {
            warn!("Cleanup before check failed: {}", e);
            self.auxiliary.push(reasons::PRE_CLEANUP_FAILED.to_string());
        }
        info!(
            "Waiting {}s for deletions to settle",
            self.settings.settle_delay.as_secs_f64()
        );
        tokio::time::sleep(self.settings.settle_delay).await;

        self.enter(CheckPhase::Create);
        info!(name = %name, "Creating external secret...");
        let created = self
            .client
            .create(&self.descriptor)
            .instrument(info_span!("check.phase", phase = %self.phase))
            .await;
        if let Err(e) = created {
            error!("Creating ExternalSecret failed: {}", e);
            return self.fail(reasons::CREATE_FAILED).await;
        }
        info!(name = %name, "Created ExternalSecret");

        self.enter(CheckPhase::Validate);
        let client = &self.client;
        let validated = poll_until(
            &self.settings.poll,
            "operator created matching secret",
            || client.get(Collection::Secrets, &name),
        )
        .instrument(info_span!("check.phase", phase = %self.phase))
        .await;
        if let Err(e) = validated {
            error!("Validating operator created matching secret failed: {}", e);
            return self.fail(reasons::VALIDATE_FAILED).await;
        }
        info!(name = %name, "Operator created matching Secret");

        self.enter(CheckPhase::PostCleanup);
        info!("Check finished. Starting cleanup.");
        let post_cleanup = cleanup(&self.client, &name)
            .instrument(info_span!("check.phase", phase = %self.phase))
            .await;
        match post_cleanup {
            Ok(()) => Outcome::Success,
            Err(e) => {
                error!("Cleanup after successful check failed: {}", e);
                let mut outcome = Outcome::failure(self.phase, reasons::POST_CLEANUP_FAILED);
                for note in self.auxiliary.drain(..) {
                    outcome.annotate(note);
                }
                outcome
            }
        }
    }

    fn enter(&mut self, phase: CheckPhase) {
        info!(from = %self.phase, to = %phase, "Entering phase");
        self.phase = phase;
    }

    /// Build a failure for the current phase, attempting cleanup first
    async fn fail(&mut self, reason: &str) -> Outcome {
        let mut outcome = Outcome::failure(self.phase, reason);
        for note in self.auxiliary.drain(..) {
            outcome.annotate(note);
        }

        info!("Attempting cleanup before reporting failures");
        let attempt = AssertUnwindSafe(cleanup(&self.client, self.descriptor.name()))
            .catch_unwind()
            .await;
        match attempt {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Cleanup failed: {}", e);
                outcome.annotate(reasons::CLEANUP_FAILED);
            }
            Err(panic) => {
                warn!("Cleanup panicked: {}", panic_message(panic.as_ref()));
                outcome.annotate(reasons::CLEANUP_FAILED);
            }
        }
        outcome
    }
}

/// Set up, run and report one check
///
/// `setup` resolves the manifest and clients. A setup error fails the run
/// with "setup failed" followed by the error chain; there is nothing to
/// clean up because no resource client exists yet. The verdict is reported exactly once before returning.
pub async fn execute<C, S, R>(setup: S, reporter: R) -> RunExit
where
    C: ResourceClient,
    S: Future<Output = anyhow::Result<Check<C>>>,
    R: Reporter,
{
    let outcome = match AssertUnwindSafe(setup).catch_unwind().await {
        Ok(Ok(mut check)) => check.run_isolated().await,
        Ok(Err(e)) => {
            error!("Setup failed: {:#}", e);
            warn!("No resource client available, skipping cleanup");
            let mut outcome = Outcome::failure(CheckPhase::Init, reasons::SETUP_FAILED);
            outcome.annotate(format!("{e:#}"));
            outcome
        }
        Err(panic) => {
            error!("Recovered panic during setup: {}", panic_message(panic.as_ref()));
            Outcome::failure(CheckPhase::Init, reasons::UNEXPECTED_FAULT)
        }
    };

    deliver(&reporter, &outcome).await
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
