//! OpenAI-compatible vision client.
//!
//! One instance is constructed by the composition root and shared by every
//! capture session. The credential is read once at the start of each call, so
//! a later `configure` only affects requests dispatched after it.

use std::sync::RwLock;
use std::time::Duration;

use palletlens_core::config::InferenceConfig;
use palletlens_core::error::LensError;
use palletlens_core::types::{AnalysisError, AnalysisResult, Credential};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::request::AnalysisRequest;
use crate::wire::{ApiError, ChatRequest, ChatResponse};
use crate::VisionClient;

pub struct OpenAiVisionClient {
    http: Client,
    config: InferenceConfig,
    credential: RwLock<Option<Credential>>,
}

impl OpenAiVisionClient {
    /// Build an unconfigured client. Call `configure` before analyzing.
    pub fn new(config: InferenceConfig) -> Result<Self, LensError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LensError::Inference(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            credential: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Full URL of the chat-completions endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn current_credential(&self) -> Option<Credential> {
        match self.credential.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// POST the request and return the first completion's text.
    async fn send(
        &self,
        credential: &Credential,
        body: &ChatRequest,
    ) -> Result<Option<String>, String> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(credential.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&error_text) {
                return Err(api_error.error.message);
            }
            return Err(format!("API error ({}): {}", status, error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;
        Ok(parsed.first_text())
    }
}

impl VisionClient for OpenAiVisionClient {
    fn configure(&self, credential: Option<Credential>) {
        let configured = credential.is_some();
        match self.credential.write() {
            Ok(mut guard) => *guard = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
        info!(configured, "Inference client configured");
    }

    fn is_configured(&self) -> bool {
        self.current_credential().is_some()
    }

    async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        let Some(credential) = self.current_credential() else {
            debug!("Analyze called without a credential");
            return AnalysisError::NotConfigured.into();
        };

        let body = ChatRequest::from_analysis(&self.config.model, self.config.max_tokens, &request);
        debug!(
            encoding_id = %request.encoding().id(),
            model = %self.config.model,
            detail = %request.detail(),
            "Dispatching vision request"
        );

        match self.send(&credential, &body).await {
            Ok(text) => AnalysisResult::from_text(text),
            Err(message) => {
                warn!(encoding_id = %request.encoding().id(), error = %message, "Vision request failed");
                AnalysisError::Remote(message).into()
            }
        }
    }
}

impl std::fmt::Debug for OpenAiVisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiVisionClient")
            .field("endpoint", &self.endpoint())
            .field("model", &self.config.model)
            .field("configured", &self.is_configured())
            .finish()
    }
}
