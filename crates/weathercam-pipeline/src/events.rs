//! Cycle outcomes and their consumer.

use tokio::sync::mpsc;
use weathercam_core::AppError;
use weathercam_services::WeatherRecord;

/// Where a cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Preprocess,
    Inference,
    Publish,
    Timeout,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Preprocess => "preprocess",
            Self::Inference => "inference",
            Self::Publish => "publish",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one capture cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    Published {
        cycle_id: u64,
        record: WeatherRecord,
        /// The record carries default coordinates
        location_missing: bool,
    },
    Failed {
        cycle_id: u64,
        stage: Stage,
        error: AppError,
    },
}

impl CycleOutcome {
    pub fn failed(cycle_id: u64, stage: Stage, error: impl Into<AppError>) -> Self {
        Self::Failed {
            cycle_id,
            stage,
            error: error.into(),
        }
    }

    pub fn cycle_id(&self) -> u64 {
        match self {
            Self::Published { cycle_id, .. } | Self::Failed { cycle_id, .. } => *cycle_id,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }

    pub fn log(&self) {
        match self {
            Self::Published {
                cycle_id,
                record,
                location_missing,
            } => {
                if *location_missing {
                    tracing::warn!(
                        cycle_id,
                        "Published {} without a location; default coordinates used",
                        record.weather
                    );
                } else {
                    tracing::info!(cycle_id, "Published {}", record.weather);
                }
            }
            Self::Failed {
                cycle_id,
                stage,
                error,
            } => {
                tracing::error!(cycle_id, %stage, "Cycle failed: {}", error);
                tracing::warn!(cycle_id, "{}", error.user_message());
            }
        }
    }
}

/// Log every outcome until all senders are gone. Returns the number of
/// failed cycles seen.
pub async fn log_outcomes(mut outcomes: mpsc::Receiver<CycleOutcome>) -> u64 {
    let mut failures = 0;
    while let Some(outcome) = outcomes.recv().await {
        if !outcome.is_published() {
            failures += 1;
        }
        outcome.log();
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use weathercam_core::{CaptureError, InferenceError};

    fn record() -> WeatherRecord {
        WeatherRecord {
            weather: "sunny".into(),
            latitude: 0.0,
            longitude: 0.0,
            time: "null".into(),
        }
    }

    #[test]
    fn test_failed_wraps_stage_error() {
        let outcome = CycleOutcome::failed(3, Stage::Inference, InferenceError::NonFinite(1));
        assert_eq!(outcome.cycle_id(), 3);
        assert!(!outcome.is_published());
        assert!(matches!(
            outcome,
            CycleOutcome::Failed {
                stage: Stage::Inference,
                error: AppError::Inference(InferenceError::NonFinite(1)),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_log_outcomes_counts_failures() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(CycleOutcome::Published {
            cycle_id: 1,
            record: record(),
            location_missing: true,
        })
        .await
        .unwrap();
        tx.send(CycleOutcome::failed(2, Stage::Capture, CaptureError::NotConfigured))
            .await
            .unwrap();
        tx.send(CycleOutcome::failed(3, Stage::Timeout, AppError::Timeout(60)))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(log_outcomes(rx).await, 2);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Publish.to_string(), "publish");
        assert_eq!(Stage::Timeout.as_str(), "timeout");
    }
}
