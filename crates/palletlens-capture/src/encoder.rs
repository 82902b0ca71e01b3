//! Turns camera frames and uploaded files into data-URI encodings.
//!
//! Camera input is a synchronous snapshot; file input is read asynchronously
//! and keeps the file's declared MIME type. Nothing here retries.

use std::path::{Path, PathBuf};

use palletlens_core::config::CaptureConfig;
use palletlens_core::types::ImageEncoding;
use tracing::debug;

use crate::error::CaptureError;
use crate::CameraSource;

/// Bytes backing a [`FileBlob`].
#[derive(Debug, Clone)]
enum BlobContent {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A user-selected file with its declared MIME type.
#[derive(Debug, Clone)]
pub struct FileBlob {
    name: String,
    mime_type: String,
    content: BlobContent,
}

impl FileBlob {
    /// A file on disk. The MIME type is guessed from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            mime_type,
            content: BlobContent::Path(path),
        }
    }

    /// In-memory content with an explicitly declared MIME type.
    pub fn from_bytes(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            content: BlobContent::Bytes(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            BlobContent::Path(p) => Some(p),
            BlobContent::Bytes(_) => None,
        }
    }
}

/// Limits applied while encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderLimits {
    /// JPEG quality (1-100) for camera snapshots.
    pub jpeg_quality: u8,
    /// Largest file accepted, in bytes.
    pub max_file_bytes: u64,
}

impl Default for EncoderLimits {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for EncoderLimits {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            max_file_bytes: config.max_file_bytes,
        }
    }
}

/// Snapshot the attached camera and encode the frame as a JPEG data URI.
///
/// Fails with `CameraUnavailable` when no camera is attached or its stream is
/// not ready; callers treat that as a no-op.
pub fn encode_camera(
    camera: Option<&dyn CameraSource>,
    jpeg_quality: u8,
) -> Result<ImageEncoding, CaptureError> {
    let camera = camera
        .filter(|c| c.is_ready())
        .ok_or(CaptureError::CameraUnavailable)?;
    let frame = camera.snapshot()?;
    let jpeg = frame.to_jpeg(jpeg_quality)?;

    debug!(
        width = frame.width(),
        height = frame.height(),
        bytes = jpeg.len(),
        "Camera frame encoded"
    );
    Ok(ImageEncoding::from_bytes("image/jpeg", &jpeg))
}

/// Read the whole file and encode it under its declared MIME type.
pub async fn encode_file(
    blob: FileBlob,
    limits: EncoderLimits,
) -> Result<ImageEncoding, CaptureError> {
    if !blob.mime_type.starts_with("image/") {
        return Err(CaptureError::UnsupportedType(blob.mime_type));
    }

    let bytes = match blob.content {
        BlobContent::Bytes(bytes) => bytes,
        BlobContent::Path(path) => {
            let read_err = |source| CaptureError::Read {
                path: path.display().to_string(),
                source,
            };
            let metadata = tokio::fs::metadata(&path).await.map_err(read_err)?;
            if metadata.len() > limits.max_file_bytes {
                return Err(CaptureError::TooLarge {
                    size: metadata.len(),
                    limit: limits.max_file_bytes,
                });
            }
            tokio::fs::read(&path).await.map_err(read_err)?
        }
    };

    if bytes.is_empty() {
        return Err(CaptureError::Empty);
    }
    let size = bytes.len() as u64;
    if size > limits.max_file_bytes {
        return Err(CaptureError::TooLarge {
            size,
            limit: limits.max_file_bytes,
        });
    }

    debug!(name = %blob.name, mime = %blob.mime_type, bytes = size, "File encoded");
    Ok(ImageEncoding::from_bytes(&blob.mime_type, &bytes))
}

/// Encoder bound to a fixed set of limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEncoder {
    limits: EncoderLimits,
}

impl ImageEncoder {
    pub fn new(limits: EncoderLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> EncoderLimits {
        self.limits
    }

    pub fn encode_camera(
        &self,
        camera: Option<&dyn CameraSource>,
    ) -> Result<ImageEncoding, CaptureError> {
        encode_camera(camera, self.limits.jpeg_quality)
    }

    pub async fn encode_file(&self, blob: FileBlob) -> Result<ImageEncoding, CaptureError> {
        encode_file(blob, self.limits).await
    }
}
