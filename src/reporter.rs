//! # Reporter
//!
//! Delivers the verdict to the health aggregator.
//!
//! The aggregator expects one `POST` per run to `KH_REPORTING_URL`, carrying
//! the run id in the `kh-run-uuid` header and a body of the form
//! `{"OK": true, "Errors": []}`.

use crate::constants::RUN_UUID_HEADER;
use crate::outcome::{Outcome, RunExit};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors from the reporting transport
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("reporting URL is not configured")]
    MissingUrl,
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} rejected the report with status {status}")]
    Rejected { url: String, status: u16 },
}

/// Outbound verdict channel
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report_success(&self) -> Result<(), ReportError>;

    async fn report_failure(&self, reasons: &[String]) -> Result<(), ReportError>;
}

#[async_trait]
impl<T: Reporter + ?Sized> Reporter for Arc<T> {
    async fn report_success(&self) -> Result<(), ReportError> {
        (**self).report_success().await
    }

    async fn report_failure(&self, reasons: &[String]) -> Result<(), ReportError> {
        (**self).report_failure(reasons).await
    }
}

/// Wire format of a check report
#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    #[serde(rename = "OK")]
    ok: bool,
    #[serde(rename = "Errors")]
    errors: &'a [String],
}

/// [`Reporter`] that posts to the aggregator over HTTP
#[derive(Debug, Clone)]
pub struct KuberhealthyReporter {
    http: reqwest::Client,
    url: Option<String>,
    run_uuid: String,
}

impl KuberhealthyReporter {
    pub fn new(url: Option<String>, run_uuid: String) -> Result<Self, ReportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|source| ReportError::Transport {
                url: url.clone().unwrap_or_default(),
                source,
            })?;
        Ok(Self {
            http,
            url,
            run_uuid,
        })
    }

    async fn send(&self, report: &CheckReport<'_>) -> Result<(), ReportError> {
        let url = self.url.as_deref().ok_or(ReportError::MissingUrl)?;

        let response = self
            .http
            .post(url)
            .header(RUN_UUID_HEADER, &self.run_uuid)
            .json(report)
            .send()
            .await
            .map_err(|source| ReportError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ReportError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Reporter for KuberhealthyReporter {
    async fn report_success(&self) -> Result<(), ReportError> {
        self.send(&CheckReport {
            ok: true,
            errors: &[],
        })
        .await
    }

    async fn report_failure(&self, reasons: &[String]) -> Result<(), ReportError> {
        self.send(&CheckReport {
            ok: false,
            errors: reasons,
        })
        .await
    }
}

/// Report `outcome` exactly once and decide how the process should exit
///
/// A failure verdict always exits non-zero, whether or not the report got
/// through. A success verdict exits zero only if the report was accepted.
pub async fn deliver<R>(reporter: &R, outcome: &Outcome) -> RunExit
where
    R: Reporter + ?Sized,
{
    match outcome {
        Outcome::Success => {
            info!("Reporting success");
            match reporter.report_success().await {
                Ok(()) => RunExit::Success,
                Err(e) => {
                    error!("Error reporting success: {}", e);
                    RunExit::ReportFailed
                }
            }
        }
        Outcome::Failure { phase, reasons } => {
            warn!(%phase, ?reasons, "Reporting failures");
            if let Err(e) = reporter.report_failure(reasons).await {
                error!("Error reporting failures: {}", e);
            }
            RunExit::Failure
        }
    }
}
