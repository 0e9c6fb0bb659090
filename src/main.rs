use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use weathercam_core::Config;
use weathercam_pipeline::{log_outcomes, Pipeline, Scheduler};
use weathercam_services::{resolve_output_dir, CaptureService, CommandCamera, FirestoreClient};
use weathercam_vision::OnnxClassifier;

const OUTCOME_BUFFER: usize = 16;
const PROBE_FILE: &str = ".weathercam-write-test";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    weathercam_core::init()?;

    let (config, _) = Config::load_validated()?;
    tracing::info!("Config directory: {}", config.config_dir.display());

    let pipeline = preflight(&config).context("Startup checks failed")?;
    tracing::info!("weathercam started");

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(OUTCOME_BUFFER);
    let logger = tokio::spawn(log_outcomes(rx));
    let scheduler = Scheduler::from_config(Arc::new(pipeline), &config.capture);
    let scheduler = tokio::spawn(scheduler.run(tx, cancel.clone()));

    // Graceful shutdown
    shutdown_signal().await;
    cancel.cancel();

    let cycles = scheduler.await.context("Scheduler task failed")?;
    let failures = logger.await.context("Outcome logger failed")?;
    tracing::info!("Stopped after {} cycles, {} failed", cycles, failures);

    Ok(())
}

/// Check that every device the cycle needs is usable and assemble the pipeline.
fn preflight(config: &Config) -> Result<Pipeline> {
    let camera = CommandCamera::new(&config.capture.command)?;
    let program = camera
        .resolve_program()
        .with_context(|| format!("Camera program `{}` not found", camera.program()))?;
    tracing::info!("Camera: {}", program.display());

    let output_dir = resolve_output_dir(config.capture.output_dir.as_deref())?;
    check_writable(&output_dir)?;

    if !config.model.path.is_file() {
        anyhow::bail!("Model file {} not found", config.model.path.display());
    }
    let classifier = OnnxClassifier::load(&config.model.path)?;

    let publisher = FirestoreClient::new(&config.store)?;
    tracing::info!("Publishing to {}", publisher.endpoint().path());

    let location = weathercam_geo::from_config(&config.location)?;

    Ok(Pipeline::new(
        CaptureService::new(Arc::new(camera), output_dir),
        location,
        Arc::new(classifier),
        Arc::new(publisher),
    )
    .keep_photos(config.capture.keep_photos))
}

fn check_writable(dir: &Path) -> Result<()> {
    let probe = dir.join(PROBE_FILE);
    std::fs::write(&probe, b"")
        .with_context(|| format!("Photo directory {} is not writable", dir.display()))?;
    if let Err(e) = std::fs::remove_file(&probe) {
        tracing::warn!("Failed to remove {}: {}", probe.display(), e);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
