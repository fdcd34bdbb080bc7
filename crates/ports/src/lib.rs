//! Ports - Abstraction Layer
//!
//! This crate defines ports (traits) that represent the external
//! collaborators of the reconciliation core: the cluster-wide object store,
//! the CI engine client, and the lifecycle event recorder. Adapters
//! implement them in the infrastructure layer; tests substitute fakes.

pub mod ci_engine;
pub mod event_recorder;
pub mod run_store;

pub use crate::ci_engine::{
    CiEngineClient, EngineError, NodeEdge, PipelineCoordinates, RemoteBranch, RemoteRun, StageNode,
    TriggerOptions, run_result, run_state,
};
pub use crate::event_recorder::{EventRecorder, EventType, reason};
pub use crate::run_store::{PipelineRunStore, PipelineStore, StoreError};
