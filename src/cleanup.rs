//! # Cleanup
//!
//! Removes the ExternalSecret and the Secret derived from it.
//!
//! Runs before the check to clear leftovers from an earlier run and after it
//! to leave the namespace clean. Behaves the same in both positions: a
//! missing object counts as deleted, so calling it when nothing exists
//! succeeds.

use crate::client::{ClientError, Collection, ResourceClient};
use tracing::{debug, info};

/// Delete the ExternalSecret, then the Secret, both named `name`
///
/// The Secret is deleted explicitly in case the operator's owner reference
/// did not cascade. The first error other than "not found" stops the
/// sequence and is returned; nothing is retried here.
pub async fn cleanup<C>(client: &C, name: &str) -> Result<(), ClientError>
where
    C: ResourceClient + ?Sized,
{
    for collection in [Collection::ExternalSecrets, Collection::Secrets] {
        info!(%collection, name, "Deleting {} if it exists", collection);
        ignore_not_found(client.delete(collection, name).await)?;
    }
    Ok(())
}

/// Fold "not found" into success
fn ignore_not_found(result: Result<(), ClientError>) -> Result<(), ClientError> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!("{}, nothing to delete", e);
            Ok(())
        }
        other => other,
    }
}
