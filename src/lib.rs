//! External Secrets Check Library
//!
//! A short-lived health check that verifies an external-secrets operator
//! turns an `ExternalSecret` into a matching `Secret`.
//!
//! One run:
//!
//! 1. deletes leftovers from earlier runs,
//! 2. creates the ExternalSecret from the manifest,
//! 3. polls until the operator has produced the Secret,
//! 4. deletes both objects again,
//! 5. reports the verdict to the health aggregator,
//!
//! all under a watchdog that abandons the run at the aggregator's deadline.

pub mod backoff;
pub mod check;
pub mod cleanup;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod manifest;
pub mod observability;
pub mod outcome;
pub mod reporter;
pub mod runtime;
pub mod watchdog;
