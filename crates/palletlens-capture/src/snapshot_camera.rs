//! Camera backed by a frame file that an external process keeps refreshing.
//!
//! IP cameras and capture daemons commonly expose their latest frame as a
//! file on disk. The camera is ready only while that file exists.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CaptureError;
use crate::{CameraSource, RawFrame};

/// Treats the image at `path` as the camera's currently rendered frame.
#[derive(Debug, Clone)]
pub struct SnapshotFileCamera {
    path: PathBuf,
}

impl SnapshotFileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraSource for SnapshotFileCamera {
    fn is_ready(&self) -> bool {
        self.path.is_file()
    }

    fn snapshot(&self) -> Result<RawFrame, CaptureError> {
        // The frame can vanish between `is_ready` and the read.
        let data = std::fs::read(&self.path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => CaptureError::CameraUnavailable,
            _ => CaptureError::Read {
                path: self.path.display().to_string(),
                source,
            },
        })?;
        let img = image::load_from_memory(&data)
            .map_err(|e| CaptureError::Frame(format!("failed to decode frame: {}", e)))?;
        debug!(path = %self.path.display(), width = img.width(), height = img.height(), "Frame grabbed");
        RawFrame::from_image(img)
    }
}
