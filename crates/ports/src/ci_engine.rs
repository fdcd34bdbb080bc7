//! CI Engine Client Port
//!
//! Synchronous RPC surface of the external continuous-integration engine:
//! trigger a run, poll its result and stage tree, list the run history of a
//! pipeline, and delete the history of a finished run. Payloads are typed;
//! an adapter that receives an unexpected payload shape must surface
//! [`EngineError::Payload`] instead of coercing the value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runway_core::Parameter;
use serde::{Deserialize, Serialize};

/// Location of a pipeline on the engine: a folder (the record namespace)
/// plus the pipeline name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCoordinates {
    pub folder: String,
    pub name: String,
}

impl PipelineCoordinates {
    pub fn new(folder: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PipelineCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.folder, self.name)
    }
}

/// Options for triggering a run on the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOptions {
    pub coordinates: PipelineCoordinates,
    /// Required for multi-branch pipelines, absent otherwise.
    pub branch: Option<String>,
    pub parameters: Vec<Parameter>,
}

/// Branch a remote run was built from. The engine reports the branch name
/// in the `url` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBranch {
    pub url: String,
}

/// Well-known remote run states.
pub mod run_state {
    pub const QUEUED: &str = "QUEUED";
    pub const RUNNING: &str = "RUNNING";
    pub const PAUSED: &str = "PAUSED";
    pub const SKIPPED: &str = "SKIPPED";
    pub const NOT_BUILT: &str = "NOT_BUILT";
    pub const FINISHED: &str = "FINISHED";
}

/// Well-known remote run results.
pub mod run_result {
    pub const SUCCESS: &str = "SUCCESS";
    pub const FAILURE: &str = "FAILURE";
    pub const FAILED: &str = "FAILED";
    pub const ABORTED: &str = "ABORTED";
    pub const UNSTABLE: &str = "UNSTABLE";
    pub const UNKNOWN: &str = "UNKNOWN";
}

/// Summary of one run as the engine reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteRun {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<RemoteBranch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_duration_millis: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<i64>,
}

/// One node of a run's stage tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageNode {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<i64>,
    #[serde(default)]
    pub edges: Vec<NodeEdge>,
}

/// Downstream edge of a stage node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEdge {
    pub id: String,
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("resource not found on engine")]
    NotFound,
    #[error("engine request failed: {0}")]
    Remote(String),
    #[error("unexpected engine payload: {0}")]
    Payload(String),
}

impl From<EngineError> for runway_core::DomainError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound => runway_core::DomainError::NotFound(err.to_string()),
            EngineError::Remote(_) | EngineError::Payload(_) => {
                runway_core::DomainError::Infrastructure(err.to_string())
            }
        }
    }
}

#[async_trait]
pub trait CiEngineClient: Send + Sync {
    /// Trigger a run; returns the engine's summary carrying the new run id.
    async fn trigger(&self, options: TriggerOptions) -> Result<RemoteRun, EngineError>;

    /// Fetch the current result of a previously triggered run.
    async fn fetch_result(
        &self,
        coordinates: &PipelineCoordinates,
        branch: Option<&str>,
        run_id: &str,
    ) -> Result<RemoteRun, EngineError>;

    /// Fetch the stage/node tree of a previously triggered run.
    async fn fetch_stages(
        &self,
        coordinates: &PipelineCoordinates,
        branch: Option<&str>,
        run_id: &str,
    ) -> Result<Vec<StageNode>, EngineError>;

    /// List the engine's run history for a pipeline.
    async fn list_runs(
        &self,
        coordinates: &PipelineCoordinates,
    ) -> Result<Vec<RemoteRun>, EngineError>;

    /// Delete the stored history of one build.
    async fn delete_history(
        &self,
        coordinates: &PipelineCoordinates,
        build_number: i64,
    ) -> Result<(), EngineError>;
}
