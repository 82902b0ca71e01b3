//! Per-slot capture session: acquire an image, analyze it, publish the result.
//!
//! A `CaptureSession` is a cheap, cloneable handle. Clones share state, so a
//! UI can hold one clone for rendering while a spawned task drives another.
//!
//! The session keeps a generation counter that moves whenever the current
//! image changes. An analysis only applies its result if the generation it was
//! dispatched under is still current; otherwise the result is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use palletlens_capture::{CameraSource, CaptureError, FileBlob, ImageEncoder};
use palletlens_core::events::SessionEvent;
use palletlens_core::types::{
    AnalysisError, AnalysisResult, DetailLevel, FailureKind, ImageEncoding, ImageSourceKind,
    SlotId,
};
use palletlens_inference::{AnalysisRequest, VisionClient};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::state::{Phase, SessionState};

const EVENT_CAPACITY: usize = 64;

/// Where the next image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Snapshot of the attached camera.
    Camera,
    /// A user-selected file.
    File(FileBlob),
}

impl ImageSource {
    pub fn kind(&self) -> ImageSourceKind {
        match self {
            ImageSource::Camera => ImageSourceKind::Camera,
            ImageSource::File(_) => ImageSourceKind::File,
        }
    }
}

/// Render-ready snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub slot: SlotId,
    pub phase: Phase,
    /// Current image, for the preview. Not serialized.
    #[serde(skip)]
    pub preview: Option<ImageEncoding>,
    pub image_id: Option<Uuid>,
    pub mime_type: Option<String>,
    pub description: Option<String>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    pub analyzing: bool,
    pub encoding: bool,
    pub camera_attached: bool,
    pub generation: u64,
}

struct Inner {
    state: SessionState,
    image: Option<ImageEncoding>,
    generation: u64,
    encoding: bool,
    in_flight: bool,
    camera: Option<Arc<dyn CameraSource>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            image: None,
            generation: 0,
            encoding: false,
            in_flight: false,
            camera: None,
        }
    }

    fn view(&self, slot: &SlotId) -> SessionView {
        let result = self.state.result();
        SessionView {
            slot: slot.clone(),
            phase: self.state.phase(),
            preview: self.image.clone(),
            image_id: self.image.as_ref().map(|i| i.id()),
            mime_type: self.image.as_ref().map(|i| i.mime_type().to_string()),
            description: result.and_then(|r| r.description()).map(str::to_string),
            error: result.and_then(|r| r.failure()).map(|e| e.to_string()),
            failure: result.and_then(|r| r.failure()).map(|e| e.kind()),
            analyzing: self.in_flight,
            encoding: self.encoding,
            camera_attached: self.camera.is_some(),
            generation: self.generation,
        }
    }
}

/// Image acquisition and analysis for one slot.
pub struct CaptureSession<C> {
    slot: SlotId,
    client: Arc<C>,
    encoder: ImageEncoder,
    detail: DetailLevel,
    inner: Arc<Mutex<Inner>>,
    view_tx: Arc<watch::Sender<SessionView>>,
    events: broadcast::Sender<SessionEvent>,
}

impl<C> Clone for CaptureSession<C> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            client: Arc::clone(&self.client),
            encoder: self.encoder,
            detail: self.detail,
            inner: Arc::clone(&self.inner),
            view_tx: Arc::clone(&self.view_tx),
            events: self.events.clone(),
        }
    }
}

impl<C> std::fmt::Debug for CaptureSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("CaptureSession")
            .field("slot", &self.slot)
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .field("encoding", &inner.encoding)
            .field("in_flight", &inner.in_flight)
            .finish()
    }
}

impl<C> CaptureSession<C> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: VisionClient> CaptureSession<C> {
    /// Create an idle session sharing `client` with every other slot.
    pub fn new(slot: impl Into<SlotId>, client: Arc<C>) -> Self {
        let slot = slot.into();
        let inner = Inner::new();
        let (view_tx, _) = watch::channel(inner.view(&slot));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            slot,
            client,
            encoder: ImageEncoder::default(),
            detail: DetailLevel::default(),
            inner: Arc::new(Mutex::new(inner)),
            view_tx: Arc::new(view_tx),
            events,
        }
    }

    pub fn with_encoder(mut self, encoder: ImageEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_detail(mut self, detail: DetailLevel) -> Self {
        self.detail = detail;
        self
    }

    /// Publish events on a shared bus instead of a per-session one.
    pub fn with_event_sender(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn slot(&self) -> &SlotId {
        &self.slot
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn view(&self) -> SessionView {
        self.lock().view(&self.slot)
    }

    pub fn current_image(&self) -> Option<ImageEncoding> {
        self.lock().image.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Receive a fresh [`SessionView`] after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // -------------------------------------------------------------------------
    // Camera
    // -------------------------------------------------------------------------

    pub fn attach_camera(&self, camera: Arc<dyn CameraSource>) {
        self.lock().camera = Some(camera);
        debug!(slot = %self.slot, "Camera attached");
        self.publish();
    }

    pub fn detach_camera(&self) {
        self.lock().camera = None;
        debug!(slot = %self.slot, "Camera detached");
        self.publish();
    }

    // -------------------------------------------------------------------------
    // Acquisition
    // -------------------------------------------------------------------------

    /// Encode a new image and make it the slot's current image.
    ///
    /// An unavailable camera leaves the session untouched. Any other encoding
    /// failure clears the current image and records `Failure(Encoding)`.
    pub async fn acquire(&self, source: ImageSource) -> Result<ImageEncoding, SessionError> {
        let kind = source.kind();
        let camera = {
            let mut inner = self.lock();
            if inner.encoding {
                return Err(SessionError::AcquisitionPending);
            }
            inner.encoding = true;
            inner.camera.clone()
        };
        self.publish();
        let _pending = EncodingGuard { session: self };

        let outcome = match source {
            ImageSource::Camera => self.encoder.encode_camera(camera.as_deref()),
            ImageSource::File(blob) => self.encoder.encode_file(blob).await,
        };

        match outcome {
            Ok(encoding) => {
                let (generation, superseded) = {
                    let mut inner = self.lock();
                    inner.encoding = false;
                    let superseded = inner.in_flight;
                    self.transition(&mut inner, SessionState::ImageReady)?;
                    inner.image = Some(encoding.clone());
                    inner.generation += 1;
                    (inner.generation, superseded)
                };
                info!(
                    slot = %self.slot,
                    encoding_id = %encoding.id(),
                    source = ?kind,
                    bytes = encoding.byte_len(),
                    generation,
                    superseded,
                    "Image acquired"
                );
                self.emit(SessionEvent::ImageAcquired {
                    slot: self.slot.clone(),
                    encoding_id: encoding.id(),
                    source: kind,
                    mime_type: encoding.mime_type().to_string(),
                    bytes: encoding.byte_len(),
                    timestamp: Utc::now(),
                });
                self.publish();
                Ok(encoding)
            }
            Err(CaptureError::CameraUnavailable) => {
                self.lock().encoding = false;
                debug!(slot = %self.slot, "Camera not ready, capture ignored");
                self.emit_acquisition_failed(kind, &CaptureError::CameraUnavailable);
                self.publish();
                Err(SessionError::Encoding(CaptureError::CameraUnavailable))
            }
            Err(err) => {
                {
                    let mut inner = self.lock();
                    inner.encoding = false;
                    let failure = SessionState::Completed(err.to_analysis_error().into());
                    self.transition(&mut inner, failure)?;
                    inner.image = None;
                    inner.generation += 1;
                }
                warn!(slot = %self.slot, source = ?kind, error = %err, "Image acquisition failed");
                self.emit_acquisition_failed(kind, &err);
                self.publish();
                Err(SessionError::Encoding(err))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Analysis
    // -------------------------------------------------------------------------

    /// Analyze the current image and apply the result.
    ///
    /// At most one call is in flight per slot. A result that arrives after the
    /// image changed is dropped and reported as [`SessionError::Superseded`].
    pub async fn analyze(&self) -> Result<AnalysisResult, SessionError> {
        let (encoding, generation) = {
            let mut inner = self.lock();
            if inner.in_flight {
                return Err(SessionError::AlreadyAnalyzing);
            }
            if inner.encoding {
                return Err(SessionError::AcquisitionPending);
            }

            let Some(encoding) = inner.image.clone() else {
                let result = AnalysisResult::from(AnalysisError::NoImage);
                self.transition(&mut inner, SessionState::Completed(result.clone()))?;
                drop(inner);
                debug!(slot = %self.slot, "Analyze requested without an image");
                self.publish();
                return Ok(result);
            };

            self.transition(&mut inner, SessionState::Analyzing)?;
            inner.in_flight = true;
            (encoding, inner.generation)
        };

        debug!(slot = %self.slot, encoding_id = %encoding.id(), generation, "Analysis dispatched");
        self.emit(SessionEvent::AnalysisStarted {
            slot: self.slot.clone(),
            encoding_id: encoding.id(),
            timestamp: Utc::now(),
        });
        self.publish();

        let mut flight = InFlightGuard {
            session: self,
            generation,
            armed: true,
        };
        let request = AnalysisRequest::new(encoding.clone(), self.detail);
        let result = self.client.analyze(request).await;

        let applied = {
            let mut inner = self.lock();
            inner.in_flight = false;
            flight.armed = false;
            if inner.generation == generation {
                self.transition(&mut inner, SessionState::Completed(result.clone()))?;
                true
            } else {
                false
            }
        };

        if !applied {
            debug!(
                slot = %self.slot,
                encoding_id = %encoding.id(),
                generation,
                "Stale analysis result discarded"
            );
            self.emit(SessionEvent::AnalysisDiscarded {
                slot: self.slot.clone(),
                encoding_id: encoding.id(),
                timestamp: Utc::now(),
            });
            self.publish();
            return Err(SessionError::Superseded);
        }

        match result.failure() {
            Some(err) => warn!(slot = %self.slot, encoding_id = %encoding.id(), error = %err, "Analysis failed"),
            None => info!(slot = %self.slot, encoding_id = %encoding.id(), "Analysis completed"),
        }
        self.emit(SessionEvent::AnalysisCompleted {
            slot: self.slot.clone(),
            encoding_id: encoding.id(),
            failure: result.failure().map(|e| e.kind()),
            timestamp: Utc::now(),
        });
        self.publish();
        Ok(result)
    }

    /// Acquire from `source`, then analyze the new image.
    pub async fn submit(&self, source: ImageSource) -> Result<AnalysisResult, SessionError> {
        self.acquire(source).await?;
        self.analyze().await
    }

    /// Drop the current image and result and return to `Idle`.
    ///
    /// An outstanding call keeps running but its result will be discarded.
    /// Until it resolves, `analyze` still reports `AlreadyAnalyzing`.
    pub fn reset(&self) {
        {
            let mut inner = self.lock();
            warn!(slot = %self.slot, from = %inner.state, "Capture session reset to Idle");
            inner.state = SessionState::Idle;
            inner.image = None;
            inner.generation += 1;
        }
        self.publish();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn transition(&self, inner: &mut Inner, target: SessionState) -> Result<(), SessionError> {
        if !inner.state.can_transition_to(&target) {
            return Err(SessionError::InvalidTransition {
                from: inner.state.phase(),
                to: target.phase(),
            });
        }
        debug!(slot = %self.slot, "Session state: {} -> {}", inner.state, target);
        inner.state = target;
        Ok(())
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_replace(view);
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_acquisition_failed(&self, source: ImageSourceKind, err: &CaptureError) {
        self.emit(SessionEvent::AcquisitionFailed {
            slot: self.slot.clone(),
            source,
            message: err.to_string(),
            timestamp: Utc::now(),
        });
    }
}

impl<C: VisionClient + 'static> CaptureSession<C> {
    /// Run [`submit`](Self::submit) on the runtime without awaiting it.
    pub fn spawn_submit(
        &self,
        source: ImageSource,
    ) -> JoinHandle<Result<AnalysisResult, SessionError>> {
        let session = self.clone();
        tokio::spawn(async move { session.submit(source).await })
    }

    /// Run [`analyze`](Self::analyze) on the runtime without awaiting it.
    pub fn spawn_analyze(&self) -> JoinHandle<Result<AnalysisResult, SessionError>> {
        let session = self.clone();
        tokio::spawn(async move { session.analyze().await })
    }
}

/// Clears the `encoding` flag if an acquisition future is dropped mid-read.
struct EncodingGuard<'a, C: VisionClient> {
    session: &'a CaptureSession<C>,
}

impl<C: VisionClient> Drop for EncodingGuard<'_, C> {
    fn drop(&mut self) {
        let cancelled = {
            let mut inner = self.session.lock();
            std::mem::replace(&mut inner.encoding, false)
        };
        if cancelled {
            debug!(slot = %self.session.slot, "Acquisition cancelled");
            self.session.publish();
        }
    }
}

/// Clears `in_flight` and leaves `Analyzing` if an analysis future is dropped
/// before its call resolves.
struct InFlightGuard<'a, C: VisionClient> {
    session: &'a CaptureSession<C>,
    generation: u64,
    armed: bool,
}

impl<C: VisionClient> Drop for InFlightGuard<'_, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut inner = self.session.lock();
            inner.in_flight = false;
            if inner.generation == self.generation && inner.state.is_analyzing() {
                inner.state = SessionState::ImageReady;
            }
        }
        debug!(slot = %self.session.slot, generation = self.generation, "Analysis cancelled");
        self.session.publish();
    }
}

// =============================================================================
// Tests
// =============================================================================
