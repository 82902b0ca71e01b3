//! PalletLens Capture crate - camera snapshots, file reads, and data-URI encoding.
//!
//! Provides the CameraSource trait for capability-gated frame grabs, a
//! MockCamera for testing, a SnapshotFileCamera that treats an image file as
//! the live frame, and the encoder that turns either source into an
//! `ImageEncoding`.

pub mod encoder;
pub mod error;
pub mod snapshot_camera;

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};

pub use encoder::{encode_camera, encode_file, EncoderLimits, FileBlob, ImageEncoder};
pub use error::CaptureError;
pub use snapshot_camera::SnapshotFileCamera;

/// Largest width or height kept for a camera frame.
const MAX_DIMENSION: u32 = 1600;

/// A camera stream that can be snapshotted synchronously.
///
/// `snapshot` must only be relied on when `is_ready` returns true; the encoder
/// checks readiness first and fails cleanly otherwise.
pub trait CameraSource: Send + Sync {
    /// Whether a stream is attached and producing frames.
    fn is_ready(&self) -> bool;

    /// Grab the currently rendered frame.
    fn snapshot(&self) -> Result<RawFrame, CaptureError>;
}

/// An uncompressed RGB8 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl RawFrame {
    /// Wrap packed RGB8 pixel data. The buffer must hold `width * height * 3` bytes.
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected || expected == 0 {
            return Err(CaptureError::FrameSize {
                width,
                height,
                expected,
                actual: rgb.len(),
            });
        }
        Ok(Self { width, height, rgb })
    }

    /// A frame filled with a single colour.
    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Result<Self, CaptureError> {
        let pixels = width as usize * height as usize;
        let rgb = color.iter().copied().cycle().take(pixels * 3).collect();
        Self::new(width, height, rgb)
    }

    /// Convert a decoded image, downscaling anything larger than 1600px.
    pub fn from_image(img: DynamicImage) -> Result<Self, CaptureError> {
        let img = resize_if_needed(img);
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(width, height, rgb.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Serialize the frame as JPEG at the given quality (clamped to 1-100).
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, CaptureError> {
        let mut buffer = Vec::new();
        {
            let mut encoder =
                JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality.clamp(1, 100));
            encoder
                .encode(&self.rgb, self.width, self.height, ExtendedColorType::Rgb8)
                .map_err(|e| CaptureError::Frame(e.to_string()))?;
        }
        Ok(buffer)
    }
}

fn resize_if_needed(img: DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    if width <= MAX_DIMENSION && height <= MAX_DIMENSION {
        return img;
    }

    let scale = MAX_DIMENSION as f32 / width.max(height) as f32;
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);
    img.resize(new_width, new_height, image::imageops::FilterType::Triangle)
}

/// Mock camera for testing.
///
/// Produces deterministic solid-colour frames. Readiness can be toggled to
/// simulate a stream that has not started yet.
#[derive(Debug)]
pub struct MockCamera {
    width: u32,
    height: u32,
    color: [u8; 3],
    ready: AtomicBool,
    snapshots: AtomicU64,
}

impl MockCamera {
    /// A ready 64x48 grey camera.
    pub fn new() -> Self {
        Self::with_frame(64, 48, [128, 128, 128])
    }

    pub fn with_frame(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            width,
            height,
            color,
            ready: AtomicBool::new(true),
            snapshots: AtomicU64::new(0),
        }
    }

    /// A camera whose stream has not started.
    pub fn not_ready() -> Self {
        let camera = Self::new();
        camera.set_ready(false);
        camera
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Number of frames grabbed so far.
    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots.load(Ordering::SeqCst)
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSource for MockCamera {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Result<RawFrame, CaptureError> {
        if !self.is_ready() {
            return Err(CaptureError::CameraUnavailable);
        }
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        RawFrame::solid(self.width, self.height, self.color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_frame_rejects_wrong_length() {
        let result = RawFrame::new(2, 2, vec![0; 5]);
        assert!(matches!(
            result,
            Err(CaptureError::FrameSize {
                expected: 12,
                actual: 5,
                ..
            })
        ));
        assert!(RawFrame::new(0, 0, Vec::new()).is_err());
    }

    #[test]
    fn test_solid_frame_to_jpeg() {
        let frame = RawFrame::solid(16, 8, [200, 10, 10]).unwrap();
        let jpeg = frame.to_jpeg(90).unwrap();
        // SOI marker.
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn test_from_image_downscales_large_frames() {
        let img = DynamicImage::new_rgb8(3200, 800);
        let frame = RawFrame::from_image(img).unwrap();
        assert_eq!(frame.width(), 1600);
        assert_eq!(frame.height(), 400);
    }

    #[test]
    fn test_from_image_keeps_small_frames() {
        let img = DynamicImage::new_rgb8(640, 480);
        let frame = RawFrame::from_image(img).unwrap();
        assert_eq!((frame.width(), frame.height()), (640, 480));
    }

    #[test]
    fn test_mock_camera_snapshot() {
        let camera = MockCamera::with_frame(4, 4, [1, 2, 3]);
        assert!(camera.is_ready());
        let frame = camera.snapshot().unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(camera.snapshots_taken(), 1);
    }

    #[test]
    fn test_mock_camera_not_ready() {
        let camera = MockCamera::not_ready();
        assert!(!camera.is_ready());
        assert!(matches!(
            camera.snapshot(),
            Err(CaptureError::CameraUnavailable)
        ));
        assert_eq!(camera.snapshots_taken(), 0);

        camera.set_ready(true);
        assert!(camera.snapshot().is_ok());
    }
}
