//! # Resource Client
//!
//! Create, get and delete against the two collections the check touches:
//! the ExternalSecret collection named by the manifest and core/v1 Secrets.
//!
//! Every call runs under its own timeout. Errors are classified here so the
//! layers above only ever branch on [`ClientError::is_not_found`]. There are
//! no retries at this layer.

use crate::manifest::ExternalSecretDescriptor;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ApiResource, DeleteParams, PostParams};
use kube::core::DynamicObject;
use kube::{Client, Config};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// The two logical collections the check operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    ExternalSecrets,
    Secrets,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::ExternalSecrets => write!(f, "ExternalSecret"),
            Collection::Secrets => write!(f, "Secret"),
        }
    }
}

/// Classified Kubernetes API error
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The object does not exist (HTTP 404); benign during cleanup
    #[error("{collection} {name} not found")]
    NotFound { collection: Collection, name: String },
    /// The call did not finish within its timeout
    #[error("{operation} {collection} {name} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: &'static str,
        collection: Collection,
        name: String,
        timeout: Duration,
    },
    /// Any other API or transport failure
    #[error("{operation} {collection} {name} failed: {message}")]
    Api {
        operation: &'static str,
        collection: Collection,
        name: String,
        code: Option<u16>,
        message: String,
    },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    fn from_kube(
        operation: &'static str,
        collection: Collection,
        name: &str,
        error: &kube::Error,
    ) -> Self {
        let code = match error {
            kube::Error::Api(api_err) => Some(api_err.code),
            _ => None,
        };
        if code == Some(404) {
            return ClientError::NotFound {
                collection,
                name: name.to_string(),
            };
        }
        ClientError::Api {
            operation,
            collection,
            name: name.to_string(),
            code,
            message: error.to_string(),
        }
    }
}

/// Operations the check needs against the cluster
///
/// Implementations must re-resolve objects by name on every call; nothing
/// is cached between calls.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Create the ExternalSecret described by `descriptor`
    async fn create(&self, descriptor: &ExternalSecretDescriptor) -> Result<(), ClientError>;

    /// Succeeds if an object called `name` exists in `collection`
    async fn get(&self, collection: Collection, name: &str) -> Result<(), ClientError>;

    /// Delete `name` from `collection` with foreground propagation
    async fn delete(&self, collection: Collection, name: &str) -> Result<(), ClientError>;
}

#[async_trait]
impl<T: ResourceClient + ?Sized> ResourceClient for Arc<T> {
    async fn create(&self, descriptor: &ExternalSecretDescriptor) -> Result<(), ClientError> {
        (**self).create(descriptor).await
    }

    async fn get(&self, collection: Collection, name: &str) -> Result<(), ClientError> {
        (**self).get(collection, name).await
    }

    async fn delete(&self, collection: Collection, name: &str) -> Result<(), ClientError> {
        (**self).delete(collection, name).await
    }
}

/// Build a Kubernetes client
///
/// Prefers a local kubeconfig and falls back to the in-cluster service
/// account, the same order `kubectl` uses.
pub async fn connect() -> anyhow::Result<Client> {
    let config = Config::infer().await?;
    debug!(cluster_url = %config.cluster_url, "Resolved cluster configuration");
    Ok(Client::try_from(config)?)
}

/// [`ResourceClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeResourceClient {
    external_secrets: Api<DynamicObject>,
    secrets: Api<Secret>,
    request_timeout: Duration,
}

impl fmt::Debug for KubeResourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeResourceClient")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl KubeResourceClient {
    pub fn new(
        client: Client,
        namespace: &str,
        external_secret_resource: &ApiResource,
        request_timeout: Duration,
    ) -> Self {
        Self {
            external_secrets: Api::namespaced_with(
                client.clone(),
                namespace,
                external_secret_resource,
            ),
            secrets: Api::namespaced(client, namespace),
            request_timeout,
        }
    }

    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        collection: Collection,
        name: &str,
        call: F,
    ) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, kube::Error>> + Send,
    {
        with_timeout(self.request_timeout, operation, collection, name, call).await
    }
}

/// Run one API call under `timeout` and classify its error
///
/// The timer lives only as long as this call and is dropped on every
/// return path.
pub async fn with_timeout<T, F>(
    timeout: Duration,
    operation: &'static str,
    collection: Collection,
    name: &str,
    call: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, kube::Error>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ClientError::from_kube(operation, collection, name, &e)),
        Err(_elapsed) => Err(ClientError::Timeout {
            operation,
            collection,
            name: name.to_string(),
            timeout,
        }),
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn create(&self, descriptor: &ExternalSecretDescriptor) -> Result<(), ClientError> {
        let params = PostParams::default();
        self.bounded(
            "create",
            Collection::ExternalSecrets,
            descriptor.name(),
            self.external_secrets.create(&params, descriptor.object()),
        )
        .await
        .map(|_| ())
    }

    async fn get(&self, collection: Collection, name: &str) -> Result<(), ClientError> {
        match collection {
            Collection::ExternalSecrets => self
                .bounded("get", collection, name, self.external_secrets.get(name))
                .await
                .map(|_| ()),
            Collection::Secrets => self
                .bounded("get", collection, name, self.secrets.get(name))
                .await
                .map(|_| ()),
        }
    }

    async fn delete(&self, collection: Collection, name: &str) -> Result<(), ClientError> {
        let params = DeleteParams::foreground();
        match collection {
            Collection::ExternalSecrets => self
                .bounded(
                    "delete",
                    collection,
                    name,
                    self.external_secrets.delete(name, &params),
                )
                .await
                .map(|_| ()),
            Collection::Secrets => self
                .bounded("delete", collection, name, self.secrets.delete(name, &params))
                .await
                .map(|_| ()),
        }
    }
}
