//! Fixed-period trigger for capture cycles.
//!
//! Cycles are single-flight: the next tick is only awaited once the current
//! cycle has finished, and ticks missed in the meantime are skipped rather
//! than replayed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use weathercam_core::{AppError, CaptureConfig};

use crate::cycle::CycleRunner;
use crate::events::{CycleOutcome, Stage};

pub struct Scheduler {
    runner: Arc<dyn CycleRunner>,
    interval: Duration,
    cycle_timeout: Duration,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn CycleRunner>, interval: Duration, cycle_timeout: Duration) -> Self {
        Self {
            runner,
            interval,
            cycle_timeout,
        }
    }

    pub fn from_config(runner: Arc<dyn CycleRunner>, config: &CaptureConfig) -> Self {
        Self::new(
            runner,
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.cycle_timeout_secs),
        )
    }

    /// Run cycles until `cancel` fires, the first one immediately. Returns how
    /// many cycles were started.
    pub async fn run(self, outcomes: mpsc::Sender<CycleOutcome>, cancel: CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Capturing every {}s (cycle timeout {}s)",
            self.interval.as_secs(),
            self.cycle_timeout.as_secs()
        );

        let mut cycle_id = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    cycle_id += 1;
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::info!(cycle_id, "Scheduler shutting down, abandoning cycle");
                            break;
                        }
                        result = tokio::time::timeout(self.cycle_timeout, self.runner.run_cycle(cycle_id)) => {
                            match result {
                                Ok(outcome) => outcome,
                                Err(_) => CycleOutcome::failed(
                                    cycle_id,
                                    Stage::Timeout,
                                    AppError::Timeout(self.cycle_timeout.as_secs()),
                                ),
                            }
                        }
                    };

                    if outcomes.send(outcome).await.is_err() {
                        tracing::warn!("Outcome receiver closed, stopping scheduler");
                        break;
                    }
                }
            }
        }

        cycle_id
    }
}
