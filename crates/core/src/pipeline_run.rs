//! Pipeline Run Entity
//!
//! One execution attempt of a pipeline. The spec is immutable after
//! creation; labels, annotations and status are advanced by the run
//! reconciler until the record reaches a terminal phase. All lifecycle
//! state is derived from record fields, there is no stored state enum.

use crate::keys;
use crate::meta::ObjectMeta;
use crate::pipeline::PipelineSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to the pipeline definition a run was created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Source-control reference for multi-branch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScmRef {
    pub ref_name: String,
    /// The reference type cannot be determined at creation time, so it may
    /// stay empty.
    #[serde(default)]
    pub ref_type: String,
}

/// Name/value run parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Immutable run spec, fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<PipelineRef>,
    /// Present and non-empty exactly when the pipeline is multi-branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm: Option<ScmRef>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Copy of the pipeline spec at trigger time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_spec: Option<PipelineSpec>,
    /// Eligibility switch; a disabled run is never advanced.
    #[serde(default)]
    pub disabled: bool,
}

impl PipelineRunSpec {
    pub fn is_multi_branch(&self) -> bool {
        self.pipeline_spec
            .as_ref()
            .is_some_and(PipelineSpec::is_multi_branch)
    }
}

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    #[default]
    Unknown,
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    /// Whether the run has finished, and how.
    Succeeded,
    /// Whether the run is actively progressing.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Timestamped observation about one aspect of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
    pub last_probe_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            condition_type,
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now,
            last_probe_time: now,
        }
    }
}

/// Mutable run status, written only by this core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRunStatus {
    #[serde(default)]
    pub phase: RunPhase,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl PipelineRunStatus {
    /// Add a condition, replacing any existing condition of the same type.
    /// The transition time is only advanced when the status value changes.
    pub fn add_condition(&mut self, condition: Condition) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            let transitioned = existing.status != condition.status;
            let previous_transition = existing.last_transition_time;
            *existing = condition;
            if !transitioned {
                existing.last_transition_time = previous_transition;
            }
        } else {
            self.conditions.insert(0, condition);
        }
    }

    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// Pipeline run record - Aggregate Root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub metadata: ObjectMeta,
    pub spec: PipelineRunSpec,
    #[serde(default)]
    pub status: PipelineRunStatus,
}

impl PipelineRun {
    pub fn new(metadata: ObjectMeta, spec: PipelineRunSpec) -> Self {
        Self {
            metadata,
            spec,
            status: PipelineRunStatus::default(),
        }
    }

    /// The CI engine's identifier for this run, if it has been triggered.
    pub fn engine_run_id(&self) -> Option<&str> {
        self.metadata
            .annotations
            .get(keys::ENGINE_RUN_ID_ANNOTATION)
            .map(String::as_str)
    }

    /// A run has started once the engine run id annotation is set. This is
    /// the sole guard against duplicate triggering.
    pub fn has_started(&self) -> bool {
        self.engine_run_id().is_some_and(|id| !id.is_empty())
    }

    pub fn buildable(&self) -> bool {
        !self.spec.disabled
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Mark a run whose pipeline reference cannot be resolved.
    pub fn label_as_orphan(&mut self) {
        self.metadata
            .labels
            .insert(keys::ORPHAN_LABEL.to_string(), "true".to_string());
    }
}
