use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text substituted when the model answers without any textual content.
pub const NO_DESCRIPTION: &str = "No description available";

// =============================================================================
// Enums
// =============================================================================

/// Image detail hint sent alongside the image reference.
///
/// `Low` is the default: it caps the per-image token cost and latency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    #[default]
    Low,
    High,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Low => "low",
            DetailLevel::High => "high",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(DetailLevel::Low),
            "high" => Ok(DetailLevel::High),
            other => Err(format!("unknown detail level '{}': expected low or high", other)),
        }
    }
}

/// Where an image came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSourceKind {
    /// Snapshot of the attached camera stream.
    Camera,
    /// User-selected file.
    File,
}

/// Classification of a failed analysis attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No credential installed in the inference client.
    NotConfigured,
    /// Analyze requested with nothing captured.
    NoImage,
    /// Camera not ready or file unreadable.
    EncodingFailure,
    /// Network, auth, or API-side failure.
    RemoteError,
}

// =============================================================================
// Analysis outcome
// =============================================================================

/// Typed failure carried by [`AnalysisResult::Failure`].
///
/// Every variant is terminal for the attempt and recoverable by a new
/// operator action (new capture, new upload, or a credential fix).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("OpenAI client not initialized. Please provide an API key.")]
    NotConfigured,

    #[error("Please capture or upload an image first")]
    NoImage,

    #[error("Error processing image: {0}")]
    Encoding(String),

    #[error("{0}")]
    Remote(String),
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AnalysisError::NotConfigured => FailureKind::NotConfigured,
            AnalysisError::NoImage => FailureKind::NoImage,
            AnalysisError::Encoding(_) => FailureKind::EncodingFailure,
            AnalysisError::Remote(_) => FailureKind::RemoteError,
        }
    }
}

/// Outcome of one analysis attempt. Owned by the session that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResult {
    /// Model-produced description. Never empty.
    Description(String),
    Failure(AnalysisError),
}

impl AnalysisResult {
    /// Build a description from optional model output, falling back to
    /// [`NO_DESCRIPTION`] when the output is absent or blank.
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            Some(t) if !t.trim().is_empty() => AnalysisResult::Description(t.trim().to_string()),
            _ => AnalysisResult::Description(NO_DESCRIPTION.to_string()),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            AnalysisResult::Description(text) => Some(text),
            AnalysisResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&AnalysisError> {
        match self {
            AnalysisResult::Description(_) => None,
            AnalysisResult::Failure(err) => Some(err),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AnalysisResult::Failure(_))
    }
}

impl From<AnalysisError> for AnalysisResult {
    fn from(err: AnalysisError) -> Self {
        AnalysisResult::Failure(err)
    }
}

// =============================================================================
// Image encoding
// =============================================================================

/// A MIME-tagged base64 data URI (`data:<mime>;base64,<payload>`).
///
/// Immutable once built. Cloning shares the underlying buffer. Each encoding
/// gets its own id so a result can be traced back to the image it describes.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageEncoding {
    id: Uuid,
    uri: Arc<str>,
    mime_len: usize,
    byte_len: usize,
}

impl ImageEncoding {
    const PREFIX: &'static str = "data:";
    const MARKER: &'static str = ";base64,";

    /// Encode raw image bytes under the given MIME type.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        let uri = format!(
            "{}{}{}{}",
            Self::PREFIX,
            mime_type,
            Self::MARKER,
            STANDARD.encode(bytes)
        );
        Self {
            id: Uuid::new_v4(),
            uri: Arc::from(uri),
            mime_len: mime_type.len(),
            byte_len: bytes.len(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The full data URI.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn mime_type(&self) -> &str {
        &self.uri[Self::PREFIX.len()..Self::PREFIX.len() + self.mime_len]
    }

    /// The base64 payload after the `;base64,` marker.
    pub fn payload(&self) -> &str {
        &self.uri[Self::PREFIX.len() + self.mime_len + Self::MARKER.len()..]
    }

    /// Size of the source image in bytes (before base64).
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Decode the payload back into raw image bytes.
    pub fn decode(&self) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.payload())
    }
}

impl fmt::Debug for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageEncoding")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type())
            .field("byte_len", &self.byte_len)
            .finish()
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Secret enabling authorized calls to the inference endpoint.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// Name of an independently owned image slot (e.g. "analyzer", "problem-form").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(pub String);

impl SlotId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlotId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_level_serialization() {
        let json = serde_json::to_string(&DetailLevel::Low).unwrap();
        assert_eq!(json, "\"low\"");
        let parsed: DetailLevel = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, DetailLevel::High);
        assert_eq!(DetailLevel::default(), DetailLevel::Low);
    }

    #[test]
    fn test_detail_level_from_str() {
        assert_eq!("LOW".parse::<DetailLevel>().unwrap(), DetailLevel::Low);
        assert_eq!(" high ".parse::<DetailLevel>().unwrap(), DetailLevel::High);
        assert!("auto".parse::<DetailLevel>().is_err());
    }

    #[test]
    fn test_encoding_data_uri_layout() {
        let enc = ImageEncoding::from_bytes("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]);
        assert!(enc.as_str().starts_with("data:image/jpeg;base64,"));
        assert_eq!(enc.mime_type(), "image/jpeg");
        assert_eq!(enc.payload(), "/9j/4A==");
        assert_eq!(enc.byte_len(), 4);
        assert_eq!(enc.decode().unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn test_encoding_ids_are_unique() {
        let a = ImageEncoding::from_bytes("image/png", b"same");
        let b = ImageEncoding::from_bytes("image/png", b"same");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.payload(), b.payload());
    }

    #[test]
    fn test_encoding_debug_omits_payload() {
        let enc = ImageEncoding::from_bytes("image/png", &[1u8; 64]);
        let debug = format!("{:?}", enc);
        assert!(debug.contains("image/png"));
        assert!(!debug.contains(enc.payload()));
    }

    #[test]
    fn test_credential_rejects_blank() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new(" sk-test ").unwrap().expose(), "sk-test");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("sk-very-secret").unwrap();
        assert!(!format!("{:?}", cred).contains("secret"));
    }

    #[test]
    fn test_result_from_text_fallback() {
        assert_eq!(
            AnalysisResult::from_text(None),
            AnalysisResult::Description(NO_DESCRIPTION.to_string())
        );
        assert_eq!(
            AnalysisResult::from_text(Some("  \n".to_string())),
            AnalysisResult::Description(NO_DESCRIPTION.to_string())
        );
        assert_eq!(
            AnalysisResult::from_text(Some(" pallet intact ".to_string())).description(),
            Some("pallet intact")
        );
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(AnalysisError::NotConfigured.kind(), FailureKind::NotConfigured);
        assert_eq!(AnalysisError::NoImage.kind(), FailureKind::NoImage);
        assert_eq!(
            AnalysisError::Encoding("x".into()).kind(),
            FailureKind::EncodingFailure
        );
        assert_eq!(AnalysisError::Remote("x".into()).kind(), FailureKind::RemoteError);

        let result: AnalysisResult = AnalysisError::NoImage.into();
        assert!(result.is_failure());
        assert_eq!(result.failure(), Some(&AnalysisError::NoImage));
        assert_eq!(result.description(), None);
    }

    #[test]
    fn test_slot_id_display() {
        let slot = SlotId::from("problem-form");
        assert_eq!(slot.to_string(), "problem-form");
    }
}
