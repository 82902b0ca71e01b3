//! Error type for image acquisition.

use palletlens_core::error::LensError;
use palletlens_core::types::{AnalysisError, FailureKind};

/// Errors from encoding a camera frame or an uploaded file.
///
/// Every variant is an `EncodingFailure`: terminal for the attempt, never
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera is not attached or not ready")]
    CameraUnavailable,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file type '{0}': expected an image")]
    UnsupportedType(String),
    #[error("file is empty")]
    Empty,
    #[error("file is {size} bytes, exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("frame is {actual} bytes, expected {expected} for {width}x{height} RGB")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("failed to encode frame: {0}")]
    Frame(String),
}

impl CaptureError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::EncodingFailure
    }

    /// The failure recorded in session state for this error.
    pub fn to_analysis_error(&self) -> AnalysisError {
        AnalysisError::Encoding(self.to_string())
    }
}

impl From<CaptureError> for LensError {
    fn from(err: CaptureError) -> Self {
        LensError::Capture(err.to_string())
    }
}
