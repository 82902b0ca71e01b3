//! Chat-completions wire format (OpenAI-compatible).

use palletlens_core::types::DetailLevel;
use serde::{Deserialize, Serialize};

use crate::request::AnalysisRequest;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// System message with the framing, then one user message carrying the
    /// question and exactly one image.
    pub fn from_analysis(model: &str, max_tokens: u32, request: &AnalysisRequest) -> Self {
        let instruction = request.instruction();
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: MessageContent::Text(instruction.system.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: instruction.user.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: request.encoding().as_str().to_string(),
                                detail: request.detail(),
                            },
                        },
                    ]),
                },
            ],
            max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Plain string content or a list of typed parts.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: DetailLevel,
}

/// Response body. Only the fields we read are modelled.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Text of the first completion, if any.
    pub fn first_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
    }
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error body returned by the API on non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}
