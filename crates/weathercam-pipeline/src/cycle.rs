//! One capture cycle: photo, location, classification, publish.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::instrument;
use weathercam_core::{CaptureError, InferenceError};
use weathercam_geo::{Location, LocationProvider};
use weathercam_services::{CaptureService, Publisher};
use weathercam_vision::{preprocess, read_capture_time, Classifier, InputTensor};

use crate::context::{CaptureRecord, CycleContext};
use crate::events::{CycleOutcome, Stage};

/// Something the scheduler can run once per tick.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self, cycle_id: u64) -> CycleOutcome;
}

/// The capture → classify → publish chain.
pub struct Pipeline {
    capture: CaptureService,
    location: Arc<dyn LocationProvider>,
    classifier: Arc<dyn Classifier>,
    publisher: Arc<dyn Publisher>,
    keep_photos: bool,
}

impl Pipeline {
    pub fn new(
        capture: CaptureService,
        location: Arc<dyn LocationProvider>,
        classifier: Arc<dyn Classifier>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            capture,
            location,
            classifier,
            publisher,
            keep_photos: true,
        }
    }

    /// Remove each photo once its cycle is done when `false`.
    pub fn keep_photos(mut self, keep: bool) -> Self {
        self.keep_photos = keep;
        self
    }

    async fn capture_photo(&self) -> Result<CaptureRecord, CaptureError> {
        let file_path = self.capture.capture().await?;

        let exif_path = file_path.clone();
        let capture_timestamp =
            match tokio::task::spawn_blocking(move || read_capture_time(&exif_path)).await {
                Ok(Ok(timestamp)) => timestamp,
                Ok(Err(e)) => {
                    tracing::warn!("Could not read EXIF from {}: {}", file_path.display(), e);
                    None
                }
                Err(e) => {
                    tracing::warn!("EXIF worker failed: {}", e);
                    None
                }
            };

        Ok(CaptureRecord {
            file_path,
            capture_timestamp,
        })
    }

    async fn classify_and_publish(
        &self,
        cycle_id: u64,
        requested_at: DateTime<Local>,
        capture: CaptureRecord,
        location: Option<Location>,
    ) -> CycleOutcome {
        let tensor = match preprocess_blocking(capture.file_path.clone()).await {
            Ok(tensor) => tensor,
            Err(e) => return CycleOutcome::failed(cycle_id, Stage::Preprocess, e),
        };

        let probabilities = match self.classifier.classify(tensor).await {
            Ok(probabilities) => probabilities,
            Err(e) => return CycleOutcome::failed(cycle_id, Stage::Inference, e),
        };

        let context = CycleContext {
            cycle_id,
            requested_at,
            capture,
            location,
            probabilities,
        };
        tracing::info!("{}", context.summary());
        tracing::debug!(
            "Classified {}ms after the capture request",
            context.elapsed_ms(Local::now())
        );

        let record = context.to_record();
        match self.publisher.publish(&record).await {
            Ok(()) => CycleOutcome::Published {
                cycle_id,
                record,
                location_missing: context.location.is_none(),
            },
            Err(e) => CycleOutcome::failed(cycle_id, Stage::Publish, e),
        }
    }

    async fn discard_photo(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed {}", path.display()),
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

#[async_trait]
impl CycleRunner for Pipeline {
    #[instrument(skip(self))]
    async fn run_cycle(&self, cycle_id: u64) -> CycleOutcome {
        let requested_at = Local::now();

        // the location request starts with the cycle and is joined before classification
        let (location, captured) = tokio::join!(
            self.location.last_known_location_or_none(),
            self.capture_photo()
        );

        let capture = match captured {
            Ok(capture) => capture,
            Err(e) => return CycleOutcome::failed(cycle_id, Stage::Capture, e),
        };

        let photo = capture.file_path.clone();
        let outcome = self
            .classify_and_publish(cycle_id, requested_at, capture, location)
            .await;

        if !self.keep_photos {
            self.discard_photo(&photo).await;
        }

        outcome
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("capture", &self.capture)
            .field("location", &self.location.name())
            .field("keep_photos", &self.keep_photos)
            .finish_non_exhaustive()
    }
}

async fn preprocess_blocking(path: PathBuf) -> Result<InputTensor, InferenceError> {
    tokio::task::spawn_blocking(move || preprocess(&path))
        .await
        .map_err(|e| InferenceError::Worker(e.to_string()))?
}
