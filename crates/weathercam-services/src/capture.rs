//! Photo capture.
//!
//! The camera itself sits behind [`Camera`]; the shipped implementation runs
//! an external capture tool (`fswebcam`, `libcamera-still`, ...) that writes a
//! JPEG to the path it is given.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::process::Command;
use weathercam_core::CaptureError;

/// `yyyyMMddHHmmss`, local time
pub const PHOTO_NAME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Placeholder in the camera command replaced by the target path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

const APP_DIR_NAME: &str = "weathercam";

/// File name for a photo taken at `now`.
pub fn photo_file_name(now: DateTime<Local>) -> String {
    format!("{}.jpg", now.format(PHOTO_NAME_FORMAT))
}

/// Pick and create the photo directory.
///
/// Tries the configured directory, then `<pictures>/weathercam`, then the
/// app-private data directory. The first one that can be created wins.
pub fn resolve_output_dir(configured: Option<&Path>) -> Result<PathBuf, CaptureError> {
    let candidates: Vec<PathBuf> = match configured {
        Some(dir) => vec![dir.to_path_buf()],
        None => [dirs::picture_dir(), dirs::data_local_dir()]
            .into_iter()
            .flatten()
            .map(|base| base.join(APP_DIR_NAME))
            .collect(),
    };

    let mut last_error = None;
    for dir in candidates {
        match std::fs::create_dir_all(&dir) {
            Ok(()) if dir.is_dir() => {
                tracing::info!("Saving photos to {}", dir.display());
                return Ok(dir);
            }
            Ok(()) => last_error = Some(format!("{} is not a directory", dir.display())),
            Err(e) => {
                tracing::warn!("Photo directory {} unavailable: {}", dir.display(), e);
                last_error = Some(format!("{}: {}", dir.display(), e));
            }
        }
    }

    Err(CaptureError::OutputDir(
        last_error.unwrap_or_else(|| "no candidate directory".to_string()),
    ))
}

#[async_trait]
pub trait Camera: Send + Sync {
    /// Take one photo and write it as a JPEG to `target`.
    async fn capture(&self, target: &Path) -> Result<(), CaptureError>;
}

/// Camera driven by an external command line.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    /// `command[0]` is the program, the rest its arguments.
    pub fn new(command: &[String]) -> Result<Self, CaptureError> {
        let (program, args) = command.split_first().ok_or(CaptureError::NotConfigured)?;
        if program.trim().is_empty() {
            return Err(CaptureError::NotConfigured);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with the placeholder filled in.
    pub fn args_for(&self, target: &Path) -> Vec<String> {
        let target = target.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &target))
            .collect()
    }

    /// Locate the program on disk or on `PATH`.
    pub fn resolve_program(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }

        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn capture(&self, target: &Path) -> Result<(), CaptureError> {
        tracing::debug!("Running camera command {} for {}", self.program, target.display());

        let output = Command::new(&self.program)
            .args(self.args_for(target))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CaptureError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CaptureError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Writes timestamp-named photos into one directory.
#[derive(Clone)]
pub struct CaptureService {
    camera: Arc<dyn Camera>,
    output_dir: PathBuf,
}

impl CaptureService {
    pub fn new(camera: Arc<dyn Camera>, output_dir: PathBuf) -> Self {
        Self { camera, output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Take a photo and return where it was saved.
    pub async fn capture(&self) -> Result<PathBuf, CaptureError> {
        let path = self.output_dir.join(photo_file_name(Local::now()));

        self.camera.capture(&path).await?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                tracing::info!("Photo saved: {}", path.display());
                Ok(path)
            }
            _ => Err(CaptureError::MissingOutput(path)),
        }
    }
}

impl std::fmt::Debug for CaptureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureService")
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}
