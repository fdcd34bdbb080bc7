//! Pipeline Definition Entity
//!
//! The template a run is instantiated from. Not owned by this core: it is
//! read to resolve run references, and lightly annotated for the sync
//! bookkeeping handled by the synchronizer.

use crate::keys;
use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Kind of pipeline definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineType {
    /// A single pipeline with one build stream.
    Plain,
    /// A pipeline that builds independently per source-control branch.
    MultiBranch,
}

/// Pipeline definition spec - embedded verbatim into each run record at
/// trigger time so the run stays interpretable after the definition moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub pipeline_type: PipelineType,
    /// Free-form pipeline definition text, opaque to this core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl PipelineSpec {
    pub fn is_multi_branch(&self) -> bool {
        self.pipeline_type == PipelineType::MultiBranch
    }
}

/// Pipeline definition - Aggregate Root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub metadata: ObjectMeta,
    pub spec: PipelineSpec,
}

impl Pipeline {
    pub fn new(metadata: ObjectMeta, spec: PipelineSpec) -> Self {
        Self { metadata, spec }
    }

    /// Whether an external actor has requested a run-history sync pass.
    pub fn sync_requested(&self) -> bool {
        self.metadata
            .annotations
            .contains_key(keys::REQUEST_SYNC_RUNS_ANNOTATION)
    }
}
