//! # Outcome
//!
//! The terminal verdict of a run and the process exit it maps to.

use std::fmt;

/// Phases of a check run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Init,
    PreCleanup,
    Create,
    Validate,
    PostCleanup,
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckPhase::Init => "init",
            CheckPhase::PreCleanup => "pre-cleanup",
            CheckPhase::Create => "create",
            CheckPhase::Validate => "validate",
            CheckPhase::PostCleanup => "post-cleanup",
        };
        f.write_str(name)
    }
}

/// Verdict of a single run; exactly one is produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Reasons are ordered: primary cause first, annotations after
    Failure {
        phase: CheckPhase,
        reasons: Vec<String>,
    },
}

impl Outcome {
    pub fn failure(phase: CheckPhase, reason: impl Into<String>) -> Self {
        Outcome::Failure {
            phase,
            reasons: vec![reason.into()],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Outcome::Success => &[],
            Outcome::Failure { reasons, .. } => reasons,
        }
    }

    /// Append an annotation to a failure; no-op on success
    pub fn annotate(&mut self, reason: impl Into<String>) {
        if let Outcome::Failure { reasons, .. } = self {
            reasons.push(reason.into());
        }
    }
}

/// How the process ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// Verified and reported
    Success,
    /// Failure verdict (report attempted)
    Failure,
    /// Success verdict but the report itself could not be delivered
    ReportFailed,
    /// Deadline reached before the run completed; no cleanup, no report
    DeadlineExceeded,
    /// Termination signal received; no cleanup, no report
    Interrupted(&'static str),
    /// The run task died outside the fault boundary
    Fault,
}

impl RunExit {
    pub fn code(self) -> i32 {
        match self {
            RunExit::Success => 0,
            _ => 1,
        }
    }
}
