// src/pipeline/schedule.rs

//! Periodic execution of monitoring cycles.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::cycle::{CycleOutcome, Monitor};

/// Resolve once the stop flag is raised. Never resolves if every sender is
/// dropped without raising it.
pub(crate) async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    let raised = stop.wait_for(|stopped| *stopped).await.is_ok();
    if !raised {
        std::future::pending::<()>().await;
    }
}

/// Run a cycle immediately and then once per `interval` until stopped.
///
/// Cycles never overlap: a tick that falls due while a cycle is still
/// running is skipped. Returns the number of cycles run.
pub async fn run_scheduler(
    monitor: &mut Monitor,
    interval: Duration,
    stop: watch::Receiver<bool>,
) -> usize {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycles = 0;

    log::info!(
        "Monitoring started, checking every {} minutes",
        interval.as_secs() / 60
    );

    loop {
        tokio::select! {
            _ = wait_for_stop(stop.clone()) => {
                log::info!("Shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                let report = monitor.run_cycle().await;
                cycles += 1;
                if report.outcome == CycleOutcome::Cancelled {
                    log::info!("Shutdown requested during check");
                    break;
                }
            }
        }
    }

    log::info!("Monitoring stopped after {cycles} checks");
    cycles
}
