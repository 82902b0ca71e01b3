//! PalletLens Inference crate - vision client trait and implementations.
//!
//! Provides the VisionClient trait for describing an image with a remote
//! multimodal model, a MockVisionClient for testing, and an
//! OpenAiVisionClient that talks to any OpenAI-compatible chat-completions
//! endpoint.

pub mod openai;
pub mod prompt;
pub mod request;
pub mod wire;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use palletlens_core::types::{AnalysisError, AnalysisResult, Credential};
use tokio::sync::Semaphore;
use uuid::Uuid;

pub use openai::OpenAiVisionClient;
pub use prompt::{SYSTEM_PROMPT, USER_PROMPT};
pub use request::{AnalysisRequest, Instruction};

/// Service that describes an image with a remote vision model.
///
/// One logical call per `analyze`: no batching, no streaming, no retry. Every
/// call resolves to a description or a typed failure.
pub trait VisionClient: Send + Sync {
    /// Install or clear the credential. The most recent call wins.
    fn configure(&self, credential: Option<Credential>);

    /// Whether a credential is currently installed.
    fn is_configured(&self) -> bool;

    /// Describe the image in `request`.
    ///
    /// Without a credential this resolves immediately to
    /// `Failure(NotConfigured)` and performs no network interaction.
    fn analyze(
        &self,
        request: AnalysisRequest,
    ) -> impl std::future::Future<Output = AnalysisResult> + Send;
}

/// One call observed by [`MockVisionClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub encoding_id: Uuid,
    /// Credential in effect when the call started.
    pub credential: Option<String>,
}

/// Mock vision client for testing.
///
/// Returns a fixed description (or queued per-call results) without touching
/// the network, honours `configure`, and records every call. A gated mock
/// holds each call until the test releases it, which lets tests decide the
/// order in which in-flight calls complete.
#[derive(Debug)]
pub struct MockVisionClient {
    response_text: String,
    queued: Mutex<VecDeque<AnalysisResult>>,
    credential: RwLock<Option<Credential>>,
    calls: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
    gate: Option<Semaphore>,
}

impl MockVisionClient {
    /// A configured mock with a default description.
    pub fn new() -> Self {
        Self::with_text("Mock description: a wrapped pallet on a warehouse floor")
    }

    /// A configured mock that always returns `text`.
    pub fn with_text(text: &str) -> Self {
        Self {
            response_text: text.to_string(),
            queued: Mutex::new(VecDeque::new()),
            credential: RwLock::new(Credential::new("mock-credential")),
            calls: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Start without a credential.
    pub fn unconfigured(self) -> Self {
        self.configure(None);
        self
    }

    /// Hold every call until [`release`](Self::release) grants it a permit.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Results returned by the next calls, in order, before falling back to
    /// the fixed text.
    pub fn with_responses(self, responses: Vec<AnalysisResult>) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.extend(responses);
        }
        self
    }

    /// Let `n` held calls complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Number of `analyze` calls started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.recorded.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn current_credential(&self) -> Option<Credential> {
        match self.credential.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for MockVisionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl VisionClient for MockVisionClient {
    fn configure(&self, credential: Option<Credential>) {
        match self.credential.write() {
            Ok(mut guard) => *guard = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }

    fn is_configured(&self) -> bool {
        self.current_credential().is_some()
    }

    async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        let credential = self.current_credential();
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedCall {
                encoding_id: request.encoding().id(),
                credential: credential.as_ref().map(|c| c.expose().to_string()),
            });
        }

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if credential.is_none() {
            return AnalysisError::NotConfigured.into();
        }

        let queued = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        queued.unwrap_or_else(|| AnalysisResult::from_text(Some(self.response_text.clone())))
    }
}
