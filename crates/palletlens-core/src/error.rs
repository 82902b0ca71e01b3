use thiserror::Error;

/// Top-level error type for PalletLens.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for LensError` so that `?` works across crate
/// boundaries. Per-attempt analysis failures are not errors at this level:
/// they travel inside `AnalysisResult::Failure`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Credential store error: {0}")]
    Credential(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LensError {
    fn from(err: toml::de::Error) -> Self {
        LensError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LensError {
    fn from(err: toml::ser::Error) -> Self {
        LensError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LensError {
    fn from(err: serde_json::Error) -> Self {
        LensError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for PalletLens operations.
pub type Result<T> = std::result::Result<T, LensError>;
