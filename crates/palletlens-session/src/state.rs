//! Capture session state and its transition rules.
//!
//! Valid transitions:
//! - any -> ImageReady (a new image replaces the current one)
//! - ImageReady -> Analyzing (analysis dispatched)
//! - Completed(Failure) -> Analyzing (retry with the retained image)
//! - Analyzing -> Completed (result applied)
//! - any -> Completed(Failure) (encoding failure, or analyze with no image)
//!
//! `Idle` is only reached through an explicit reset.

use std::fmt;

use palletlens_core::types::AnalysisResult;
use serde::{Deserialize, Serialize};

/// Lifecycle of one image slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing captured yet.
    Idle,
    /// An image is held and may be analyzed.
    ImageReady,
    /// An inference call for the current image is outstanding.
    Analyzing,
    /// The last attempt finished with a description or a failure.
    Completed(AnalysisResult),
}

/// Label for a [`SessionState`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    ImageReady,
    Analyzing,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::ImageReady => write!(f, "ImageReady"),
            Phase::Analyzing => write!(f, "Analyzing"),
            Phase::Completed => write!(f, "Completed"),
            Phase::Failed => write!(f, "Failed"),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.phase().fmt(f)
    }
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match self {
            SessionState::Idle => Phase::Idle,
            SessionState::ImageReady => Phase::ImageReady,
            SessionState::Analyzing => Phase::Analyzing,
            SessionState::Completed(result) if result.is_failure() => Phase::Failed,
            SessionState::Completed(_) => Phase::Completed,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, SessionState::Analyzing)
    }

    /// The applied result, if the last attempt has finished.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            SessionState::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        match (self.phase(), target.phase()) {
            (_, Phase::ImageReady) => true,
            (Phase::ImageReady | Phase::Failed, Phase::Analyzing) => true,
            (Phase::Analyzing, Phase::Completed) => true,
            (_, Phase::Failed) => true,
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
