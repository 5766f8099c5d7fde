//! # CLI
//!
//! Command-line overrides for the check.
//!
//! In a check pod everything normally arrives through the environment; the
//! flags exist for running the check by hand against a development cluster.
//!
//! ## Usage
//!
//! ```bash
//! # Run with the defaults the aggregator injects
//! external-secrets-check
//!
//! # Run against a local manifest in a scratch namespace
//! external-secrets-check --manifest ./demo.yml --namespace scratch --log-level debug
//! ```

use crate::config::{CheckConfig, LogSettings};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Verifies an external-secrets operator turns an ExternalSecret into a Secret
#[derive(Parser, Debug, Default)]
#[command(name = "external-secrets-check", version, long_about = None)]
pub struct Args {
    /// ExternalSecret manifest to create (overrides KH_CHECK_EXTERNAL_SECRETS_MANIFEST_PATH)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Namespace to run in (overrides the service account namespace)
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn as_str(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

impl Args {
    /// Apply the logging flags that were given on top of `settings`
    pub fn apply_logging(&self, settings: &mut LogSettings) {
        if let Some(level) = &self.log_level {
            settings.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.format = format.as_str().to_string();
        }
    }

    /// Apply the check flags that were given on top of `config`
    pub fn apply(self, config: &mut CheckConfig) {
        if let Some(manifest) = self.manifest {
            config.manifest_path = manifest;
        }
        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }
    }
}
