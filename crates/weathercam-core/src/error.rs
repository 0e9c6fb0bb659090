//! Error types shared by every stage of a capture cycle.
//!
//! Each stage has its own enum so the pipeline can tell where a cycle
//! stopped, and every enum offers `user_message()` for the operator-facing
//! notice that accompanies the detailed log line.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Cycle timed out after {0} seconds")]
    Timeout(u64),
}

impl AppError {
    /// Returns a short message suitable for an operator notice.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Capture(e) => e.user_message(),
            AppError::Inference(e) => e.user_message(),
            AppError::Publish(e) => e.user_message(),
            AppError::Timeout(_) => "The capture cycle took too long and was abandoned.",
        }
    }
}

/// Camera / photo write failures.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Camera command is empty")]
    NotConfigured,

    #[error("Failed to launch camera command `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Camera command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("Camera reported success but no photo was written to {0}")]
    MissingOutput(PathBuf),

    #[error("Output directory unavailable: {0}")]
    OutputDir(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureError::NotConfigured => "No camera command configured. Check your settings.",
            CaptureError::Launch { .. } => "The camera tool could not be started.",
            CaptureError::CommandFailed { .. } => "Photo capture failed.",
            CaptureError::MissingOutput(_) => "Photo capture produced no file.",
            CaptureError::OutputDir(_) => "The photo directory is not writable.",
            CaptureError::Io(_) => "Saving the photo failed.",
        }
    }
}

/// Preprocessing and classifier failures.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Unexpected tensor shape: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Classifier produced a non-finite probability at index {0}")]
    NonFinite(usize),

    #[error("Model execution failed: {0}")]
    Runtime(String),

    #[error("Inference worker failed: {0}")]
    Worker(String),
}

impl InferenceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            InferenceError::ModelLoad { .. } => "The weather model could not be loaded.",
            InferenceError::InvalidImage(_) => "The captured photo could not be read.",
            InferenceError::ShapeMismatch { .. } => {
                "The weather model does not match the expected input/output shape."
            }
            InferenceError::NonFinite(_) => "The weather model returned an invalid result.",
            InferenceError::Runtime(_) | InferenceError::Worker(_) => "Weather detection failed.",
        }
    }
}

/// Document store write failures.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Store rejected the document: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Store is not configured: {0}")]
    NotConfigured(String),
}

impl PublishError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PublishError::Network(e) => e.user_message(),
            PublishError::Rejected { status, .. } if *status == 401 || *status == 403 => {
                "The document store refused the credentials. Check your settings."
            }
            PublishError::Rejected { .. } => "The document store rejected the result.",
            PublishError::NotConfigured(_) => "The document store is not configured.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to reach the document store. Check the network connection."
            }
            NetworkError::Timeout => "The document store did not answer in time.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The document store is experiencing issues."
            }
            NetworkError::ServerError { .. } => "The request to the document store failed.",
            NetworkError::InvalidResponse(_) => "The document store sent an unexpected response.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
