use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{FailureKind, ImageSourceKind, SlotId};

/// Domain events emitted by capture sessions and the credential lifecycle.
///
/// Consumed by UI observers and by the binary's event log. Events never carry
/// image payloads or secrets.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// A new image replaced the slot's current image.
    ImageAcquired {
        slot: SlotId,
        encoding_id: Uuid,
        source: ImageSourceKind,
        mime_type: String,
        bytes: usize,
        timestamp: DateTime<Utc>,
    },

    /// Encoding a camera frame or file failed.
    AcquisitionFailed {
        slot: SlotId,
        source: ImageSourceKind,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// An inference call was dispatched for the slot's current image.
    AnalysisStarted {
        slot: SlotId,
        encoding_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// An analysis result was applied to the slot.
    ///
    /// `failure` is `None` when the model returned a description.
    AnalysisCompleted {
        slot: SlotId,
        encoding_id: Uuid,
        failure: Option<FailureKind>,
        timestamp: DateTime<Utc>,
    },

    /// A result arrived for an image that is no longer current and was dropped.
    AnalysisDiscarded {
        slot: SlotId,
        encoding_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The inference credential was replaced or cleared.
    CredentialChanged {
        configured: bool,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// The slot this event concerns. Credential changes affect every slot.
    pub fn slot(&self) -> Option<&SlotId> {
        match self {
            SessionEvent::ImageAcquired { slot, .. }
            | SessionEvent::AcquisitionFailed { slot, .. }
            | SessionEvent::AnalysisStarted { slot, .. }
            | SessionEvent::AnalysisCompleted { slot, .. }
            | SessionEvent::AnalysisDiscarded { slot, .. } => Some(slot),
            SessionEvent::CredentialChanged { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::ImageAcquired { .. } => "image_acquired",
            SessionEvent::AcquisitionFailed { .. } => "acquisition_failed",
            SessionEvent::AnalysisStarted { .. } => "analysis_started",
            SessionEvent::AnalysisCompleted { .. } => "analysis_completed",
            SessionEvent::AnalysisDiscarded { .. } => "analysis_discarded",
            SessionEvent::CredentialChanged { .. } => "credential_changed",
        }
    }
}
