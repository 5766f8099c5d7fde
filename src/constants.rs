//! # Constants
//!
//! Shared constants used throughout the check.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config`]).

/// Default location of the ExternalSecret manifest
pub const DEFAULT_MANIFEST_PATH: &str = "./external-secret-manifest.yml";

/// Service account namespace file mounted into every pod
pub const SERVICE_ACCOUNT_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Namespace used when the service account file is absent or empty
pub const DEFAULT_NAMESPACE: &str = "kuberhealthy";

/// Run deadline when the aggregator does not provide one (seconds from now)
pub const DEFAULT_DEADLINE_SECS: u64 = 120;

/// Upper bound for a single Kubernetes API call (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 6;

/// Constant interval between attempts to find the derived Secret (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;

/// Attempts to find the derived Secret: one initial try plus five retries
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 6;

/// Pause after pre-flight cleanup so cascading deletes finish (seconds)
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 5;

/// Header carrying the run identifier on report requests
pub const RUN_UUID_HEADER: &str = "kh-run-uuid";

/// Failure reasons reported to the aggregator
pub mod reasons {
    pub const SETUP_FAILED: &str = "setup failed";
    pub const CREATE_FAILED: &str = "could not create external secret";
    pub const VALIDATE_FAILED: &str = "could not validate operator created matching secret";
    pub const PRE_CLEANUP_FAILED: &str = "cleanup before check failed";
    pub const POST_CLEANUP_FAILED: &str = "cleanup after check failed";
    pub const CLEANUP_FAILED: &str = "cleanup failed";
    pub const UNEXPECTED_FAULT: &str = "unexpected fault";
}
