//! Domain Core - Pipeline Run Records and Shared Types
//!
//! This crate contains the domain entities and value objects for the
//! pipeline-run reconciliation core: the run record, the pipeline
//! definition it is instantiated from, and the well-known metadata keys
//! shared between the reconcilers.

pub mod error;
pub mod keys;
pub mod meta;
pub mod pipeline;
pub mod pipeline_run;

pub use crate::error::DomainError;
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub use crate::meta::{ObjectKey, ObjectMeta, OwnerReference};
pub use crate::pipeline::{Pipeline, PipelineSpec, PipelineType};
pub use crate::pipeline_run::{
    Condition, ConditionStatus, ConditionType, Parameter, PipelineRef, PipelineRun,
    PipelineRunSpec, PipelineRunStatus, RunPhase, ScmRef,
};

/// Result alias using the shared domain error.
pub type Result<T> = std::result::Result<T, DomainError>;
