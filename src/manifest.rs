//! # ExternalSecret Manifest
//!
//! Loads the ExternalSecret the check creates on every run.
//!
//! The manifest is kept as a [`DynamicObject`] so the check works with any
//! external-secrets API version: the document's `apiVersion` and `kind`
//! decide which collection the resource client talks to.

use kube::api::ApiResource;
use kube::core::{DynamicObject, GroupVersionKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors raised while reading or decoding the manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("File {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode manifest: {0}")]
    Decode(#[from] serde_yaml::Error),
    #[error("Manifest is not a Kubernetes object: {0}")]
    Object(#[from] serde_json::Error),
    #[error("Manifest is missing apiVersion or kind")]
    MissingTypeMeta,
    #[error("Manifest is missing metadata.name")]
    MissingName,
}

/// The ExternalSecret under test
///
/// Immutable once loaded. Its name is also the name of the Secret the
/// operator is expected to produce.
#[derive(Debug, Clone)]
pub struct ExternalSecretDescriptor {
    object: DynamicObject,
    resource: ApiResource,
    name: String,
}

impl ExternalSecretDescriptor {
    /// Decode a single YAML document
    pub fn from_yaml(contents: &str) -> Result<Self, ManifestError> {
        // Going through JSON keeps DynamicObject's flattened fields intact
        let value: serde_json::Value = serde_yaml::from_str(contents)?;
        let object: DynamicObject = serde_json::from_value(value)?;

        let types = object
            .types
            .as_ref()
            .filter(|t| !t.api_version.is_empty() && !t.kind.is_empty())
            .ok_or(ManifestError::MissingTypeMeta)?;
        let (group, version) = split_api_version(&types.api_version);
        let gvk = GroupVersionKind::gvk(group, version, &types.kind);
        let resource = ApiResource::from_gvk(&gvk);

        let name = object
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or(ManifestError::MissingName)?;

        Ok(Self {
            object,
            resource,
            name,
        })
    }

    /// Pin the descriptor to the namespace the check runs in
    #[must_use]
    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.object.metadata.namespace = Some(namespace.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.object.metadata.namespace.as_deref()
    }

    /// Collection the descriptor belongs to (e.g. `externalsecrets`)
    pub fn api_resource(&self) -> &ApiResource {
        &self.resource
    }

    pub fn object(&self) -> &DynamicObject {
        &self.object
    }
}

/// Read and decode the manifest at `path`
pub fn load(path: &Path) -> Result<ExternalSecretDescriptor, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let descriptor = ExternalSecretDescriptor::from_yaml(&contents)?;
    info!(
        name = descriptor.name(),
        kind = %descriptor.api_resource().kind,
        plural = %descriptor.api_resource().plural,
        "Loaded manifest from {}",
        path.display()
    );
    Ok(descriptor)
}

/// Split `group/version` (or a bare core `version`)
fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}
