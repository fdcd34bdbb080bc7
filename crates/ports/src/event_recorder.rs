//! Event Recorder Port
//!
//! Fire-and-forget lifecycle events consumed by observability
//! collaborators. Delivery is best effort and never awaited.

use runway_core::ObjectKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

/// Valid values for event reasons (new reasons could be added in the future).
pub mod reason {
    pub const STARTED: &str = "Started";
    pub const UPDATED: &str = "Updated";
    pub const RETRIEVE_FAILED: &str = "RetrieveFailed";
    pub const TRIGGER_FAILED: &str = "TriggerFailed";
    pub const PIPELINE_RUN_SYNCED: &str = "PipelineRunSynced";
    pub const FAILED_PIPELINE_RUN_SYNC: &str = "FailedPipelineRunSync";
}

pub trait EventRecorder: Send + Sync {
    fn event(&self, subject: &ObjectKey, event_type: EventType, reason: &str, message: String);
}
