//! # Watchdog
//!
//! Bounds the total run time.
//!
//! The run is spawned as its own task; its join handle is the one-shot
//! completion event. The watchdog then waits for whichever comes first:
//!
//! 1. the run completes (it has already reported its verdict),
//! 2. the deadline passes,
//! 3. a termination signal arrives.
//!
//! The select is biased in that order. A finished run has already reported,
//! so its verdict wins a tie. Deadline and signal both abandon the run as it
//! stands: no cleanup and no report. Leftovers are removed by the next run's
//! pre-flight cleanup.

use crate::outcome::RunExit;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Race `run` against `deadline` and `shutdown`
///
/// `shutdown` resolves with the name of the signal received. The spawned
/// run is not cancelled when the deadline or signal wins; the caller is
/// expected to exit the process immediately.
pub async fn supervise<F, S>(run: F, deadline: DateTime<Utc>, shutdown: S) -> RunExit
where
    F: Future<Output = RunExit> + Send + 'static,
    S: Future<Output = &'static str>,
{
    let remaining = time_until(deadline);
    info!(
        %deadline,
        remaining_secs = remaining.as_secs_f64(),
        "Starting check under watchdog"
    );

    let mut handle = tokio::spawn(run);
    let timer = tokio::time::sleep(remaining);

    tokio::select! {
        biased;

        joined = &mut handle => match joined {
            Ok(exit) => {
                info!(?exit, "Check completed, terminating program.");
                exit
            }
            Err(e) => {
                error!("Check task ended abnormally: {}", e);
                RunExit::Fault
            }
        },
        () = timer => {
            error!(
                %deadline,
                "Check deadline reached. Stopping everything, no cleanup will happen."
            );
            RunExit::DeadlineExceeded
        }
        signal = shutdown => {
            warn!("Received signal {}. Exiting without cleanup.", signal);
            RunExit::Interrupted(signal)
        }
    }
}

/// Monotonic time left until `deadline`, zero if it already passed
pub fn time_until(deadline: DateTime<Utc>) -> Duration {
    (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

/// Resolve on SIGINT or SIGTERM
pub async fn termination_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    Ok(()) = tokio::signal::ctrl_c() => "SIGINT",
                    Some(()) = terminate.recv() => "SIGTERM",
                    else => std::future::pending().await,
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                interrupt_only().await
            }
        }
    }

    #[cfg(not(unix))]
    {
        interrupt_only().await
    }
}

async fn interrupt_only() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            warn!("Could not install Ctrl-C handler: {}", e);
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_until_past_deadline_is_zero() {
        let past = Utc::now() - chrono::Duration::seconds(30);
        assert_eq!(time_until(past), Duration::ZERO);
    }

    #[test]
    fn test_time_until_future_deadline() {
        let future = Utc::now() + chrono::Duration::seconds(120);
        let remaining = time_until(future);
        assert!(remaining > Duration::from_secs(118));
        assert!(remaining <= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_wins() {
        let deadline = Utc::now() + chrono::Duration::seconds(60);
        let exit = supervise(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                RunExit::Success
            },
            deadline,
            std::future::pending(),
        )
        .await;
        assert_eq!(exit, RunExit::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_run() {
        let deadline = Utc::now() + chrono::Duration::seconds(1);
        let exit = supervise(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                RunExit::Success
            },
            deadline,
            std::future::pending(),
        )
        .await;
        assert_eq!(exit, RunExit::DeadlineExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_abandons_run() {
        let deadline = Utc::now() + chrono::Duration::seconds(60);
        let exit = supervise(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                RunExit::Success
            },
            deadline,
            async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "SIGTERM"
            },
        )
        .await;
        assert_eq!(exit, RunExit::Interrupted("SIGTERM"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_task_is_a_fault() {
        fn explode() -> RunExit {
            panic!("outside the fault boundary")
        }

        let deadline = Utc::now() + chrono::Duration::seconds(60);
        let exit = supervise(
            async { explode() },
            deadline,
            std::future::pending(),
        )
        .await;
        assert_eq!(exit, RunExit::Fault);
    }
}
