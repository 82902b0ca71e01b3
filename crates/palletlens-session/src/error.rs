//! Errors returned by capture session operations.
//!
//! These reject an operation outright. Failures of an accepted analysis
//! attempt are recorded in session state as `AnalysisResult::Failure` instead.

use palletlens_capture::CaptureError;
use palletlens_core::error::LensError;

use crate::state::Phase;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("an analysis is already in flight for this slot")]
    AlreadyAnalyzing,

    #[error("an image is still being encoded for this slot")]
    AcquisitionPending,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    /// The image changed while the call was outstanding; its result was dropped.
    #[error("result discarded: the image changed while it was being analyzed")]
    Superseded,

    #[error(transparent)]
    Encoding(#[from] CaptureError),
}

impl From<SessionError> for LensError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Encoding(capture) => capture.into(),
            other => LensError::Session(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_message() {
        let err = SessionError::InvalidTransition {
            from: Phase::Completed,
            to: Phase::Analyzing,
        };
        assert_eq!(err.to_string(), "Invalid state transition: Completed -> Analyzing");
    }

    #[test]
    fn test_into_lens_error() {
        let lens: LensError = SessionError::AlreadyAnalyzing.into();
        assert!(matches!(lens, LensError::Session(_)));

        let lens: LensError = SessionError::Encoding(CaptureError::Empty).into();
        assert!(matches!(lens, LensError::Capture(_)));
    }
}
