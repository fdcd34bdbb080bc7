//! Object Store Ports
//!
//! Access to run records and pipeline definitions by namespaced identity.
//! Updates carry the caller's observed resource version; a stale write is
//! rejected with [`StoreError::Conflict`] and retried by the conflict-safe
//! mutator. Metadata and status are written through separate entry points
//! because status is modelled as a distinct sub-resource.

use async_trait::async_trait;
use runway_core::{DomainError, ObjectKey, Pipeline, PipelineRun};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(ObjectKey),
    #[error("record already exists: {0}")]
    AlreadyExists(ObjectKey),
    #[error("version conflict on record: {0}")]
    Conflict(ObjectKey),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => DomainError::NotFound(key.to_string()),
            StoreError::Conflict(key) => {
                DomainError::Concurrency(format!("version conflict on {key}"))
            }
            StoreError::AlreadyExists(_) | StoreError::Backend(_) => {
                DomainError::Infrastructure(err.to_string())
            }
        }
    }
}

/// Store access for pipeline run records.
#[async_trait]
pub trait PipelineRunStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<PipelineRun, StoreError>;

    /// List run records labeled for the given pipeline.
    async fn list_for_pipeline(
        &self,
        namespace: &str,
        pipeline_name: &str,
    ) -> Result<Vec<PipelineRun>, StoreError>;

    /// Create a record, completing `generate_name` into a unique name.
    async fn create(&self, run: &PipelineRun) -> Result<PipelineRun, StoreError>;

    /// Update labels, annotations and finalizers. Never touches status.
    async fn update_metadata(&self, run: &PipelineRun) -> Result<PipelineRun, StoreError>;

    /// Update the status sub-resource. Never touches metadata.
    async fn update_status(&self, run: &PipelineRun) -> Result<PipelineRun, StoreError>;

    /// Request deletion; physical removal is deferred while finalizers remain.
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;
}

/// Store access for pipeline definitions. The core only reads them and
/// clears the sync-request marker annotation.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Pipeline, StoreError>;

    async fn update_metadata(&self, pipeline: &Pipeline) -> Result<Pipeline, StoreError>;
}
