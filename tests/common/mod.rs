//! Common test utilities
//!
//! Provides rustls setup for the Pact tests and in-memory stand-ins for the
//! cluster and the health aggregator.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use external_secrets_check::client::{ClientError, Collection, ResourceClient};
use external_secrets_check::manifest::ExternalSecretDescriptor;
use external_secrets_check::reporter::{ReportError, Reporter};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, Once};
use std::time::Duration;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// Manifest used by the flow tests
pub const DEMO_MANIFEST: &str = r"
apiVersion: external-secrets.io/v1beta1
kind: ExternalSecret
metadata:
  name: demo
spec:
  refreshInterval: 1h
  secretStoreRef:
    name: fake-store
    kind: ClusterSecretStore
  target:
    name: demo
  data:
    - secretKey: value
      remoteRef:
        key: /demo/value
";

pub fn demo_descriptor() -> ExternalSecretDescriptor {
    ExternalSecretDescriptor::from_yaml(DEMO_MANIFEST)
        .expect("demo manifest should decode")
        .in_namespace("kuberhealthy")
}

#[derive(Debug, Default)]
struct ClusterState {
    external_secrets: BTreeSet<String>,
    secrets: BTreeSet<String>,
    creates: usize,
    deletes: Vec<(Collection, String)>,
    secret_gets: u32,
}

/// In-memory namespace with a scripted operator
///
/// Deleting an ExternalSecret cascades to the Secret of the same name, as
/// the owner reference would.
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
    /// Secret lookups that miss before the operator's Secret appears;
    /// `None` means the operator never reconciles
    operator_ready_after: Option<u32>,
    /// Zero-based delete call indices that fail with a server error
    failing_deletes: HashSet<usize>,
    fail_create: bool,
    panic_on_create: bool,
    get_latency: Duration,
}

impl FakeCluster {
    /// Operator that reconciles on the first lookup
    pub fn healthy() -> Self {
        Self {
            operator_ready_after: Some(0),
            ..Self::default()
        }
    }

    /// Operator that never produces the Secret
    pub fn stalled() -> Self {
        Self::default()
    }

    /// Operator that reconciles after `misses` failed Secret lookups
    pub fn ready_after(misses: u32) -> Self {
        Self {
            operator_ready_after: Some(misses),
            ..Self::default()
        }
    }

    pub fn with_failing_deletes(mut self, calls: &[usize]) -> Self {
        self.failing_deletes = calls.iter().copied().collect();
        self
    }

    pub fn with_fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn panicking_on_create(mut self) -> Self {
        self.panic_on_create = true;
        self
    }

    pub fn with_get_latency(mut self, latency: Duration) -> Self {
        self.get_latency = latency;
        self
    }

    pub fn seed(&self, collection: Collection, name: &str) {
        let mut state = self.state.lock().unwrap();
        match collection {
            Collection::ExternalSecrets => state.external_secrets.insert(name.to_string()),
            Collection::Secrets => state.secrets.insert(name.to_string()),
        };
    }

    pub fn contains(&self, collection: Collection, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        match collection {
            Collection::ExternalSecrets => state.external_secrets.contains(name),
            Collection::Secrets => state.secrets.contains(name),
        }
    }

    pub fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    pub fn deletes(&self) -> Vec<(Collection, String)> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn secret_gets(&self) -> u32 {
        self.state.lock().unwrap().secret_gets
    }
}

fn server_error(operation: &'static str, collection: Collection, name: &str) -> ClientError {
    ClientError::Api {
        operation,
        collection,
        name: name.to_string(),
        code: Some(500),
        message: "internal error".to_string(),
    }
}

fn not_found(collection: Collection, name: &str) -> ClientError {
    ClientError::NotFound {
        collection,
        name: name.to_string(),
    }
}

#[async_trait]
impl ResourceClient for FakeCluster {
    async fn create(&self, descriptor: &ExternalSecretDescriptor) -> Result<(), ClientError> {
        assert!(!self.panic_on_create, "create exploded");

        let name = descriptor.name();
        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        if self.fail_create {
            return Err(server_error("create", Collection::ExternalSecrets, name));
        }
        if !state.external_secrets.insert(name.to_string()) {
            return Err(ClientError::Api {
                operation: "create",
                collection: Collection::ExternalSecrets,
                name: name.to_string(),
                code: Some(409),
                message: "already exists".to_string(),
            });
        }
        state.secret_gets = 0;
        Ok(())
    }

    async fn get(&self, collection: Collection, name: &str) -> Result<(), ClientError> {
        if !self.get_latency.is_zero() {
            tokio::time::sleep(self.get_latency).await;
        }

        let mut state = self.state.lock().unwrap();
        match collection {
            Collection::ExternalSecrets => {
                if state.external_secrets.contains(name) {
                    Ok(())
                } else {
                    Err(not_found(collection, name))
                }
            }
            Collection::Secrets => {
                if state.secrets.contains(name) {
                    return Ok(());
                }
                let reconciled = state.external_secrets.contains(name)
                    && self
                        .operator_ready_after
                        .is_some_and(|misses| state.secret_gets >= misses);
                state.secret_gets += 1;
                if reconciled {
                    state.secrets.insert(name.to_string());
                    Ok(())
                } else {
                    Err(not_found(collection, name))
                }
            }
        }
    }

    async fn delete(&self, collection: Collection, name: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        let call = state.deletes.len();
        state.deletes.push((collection, name.to_string()));
        if self.failing_deletes.contains(&call) {
            return Err(server_error("delete", collection, name));
        }

        let removed = match collection {
            Collection::ExternalSecrets => {
                let removed = state.external_secrets.remove(name);
                if removed {
                    state.secrets.remove(name);
                }
                removed
            }
            Collection::Secrets => state.secrets.remove(name),
        };
        if removed {
            Ok(())
        } else {
            Err(not_found(collection, name))
        }
    }
}

/// One report received by [`RecordingReporter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Success,
    Failure(Vec<String>),
}

/// Reporter that records what it was asked to send
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
    reject: bool,
}

impl RecordingReporter {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    fn record(&self, report: Report) -> Result<(), ReportError> {
        self.reports.lock().unwrap().push(report);
        if self.reject {
            return Err(ReportError::Rejected {
                url: "http://kuberhealthy.test/externalCheckStatus".to_string(),
                status: 400,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn report_success(&self) -> Result<(), ReportError> {
        self.record(Report::Success)
    }

    async fn report_failure(&self, reasons: &[String]) -> Result<(), ReportError> {
        self.record(Report::Failure(reasons.to_vec()))
    }
}
