//! In-Memory Store Implementations
//!
//! HashMap-backed stores keyed by namespaced identity. Every successful
//! write bumps the record's resource version; a write carrying a stale
//! version is rejected with [`StoreError::Conflict`]. Successful writes are
//! appended to a write log so tests can assert ordering guarantees.

use async_trait::async_trait;
use chrono::Utc;
use runway_core::{keys, ObjectKey, Pipeline, PipelineRun};
use runway_ports::{PipelineRunStore, PipelineStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Kind of write applied to a run record, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Create(ObjectKey),
    Metadata(ObjectKey),
    Status(ObjectKey),
    Delete(ObjectKey),
}

/// In-memory pipeline run store.
#[derive(Clone, Default)]
pub struct InMemoryRunStore {
    runs: Arc<RwLock<HashMap<ObjectKey, PipelineRun>>>,
    write_log: Arc<RwLock<Vec<WriteOp>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing name generation. Test helper.
    pub async fn seed(&self, mut run: PipelineRun) -> PipelineRun {
        run.metadata.resource_version = 1;
        let key = run.metadata.key();
        self.runs.write().await.insert(key, run.clone());
        run
    }

    /// Snapshot of all successful writes so far.
    pub async fn write_log(&self) -> Vec<WriteOp> {
        self.write_log.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    async fn log(&self, op: WriteOp) {
        self.write_log.write().await.push(op);
    }
}

#[async_trait]
impl PipelineRunStore for InMemoryRunStore {
    async fn get(&self, key: &ObjectKey) -> Result<PipelineRun, StoreError> {
        self.runs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn list_for_pipeline(
        &self,
        namespace: &str,
        pipeline_name: &str,
    ) -> Result<Vec<PipelineRun>, StoreError> {
        Ok(self
            .runs
            .read()
            .await
            .values()
            .filter(|run| {
                run.metadata.namespace == namespace
                    && run
                        .metadata
                        .labels
                        .get(keys::PIPELINE_NAME_LABEL)
                        .is_some_and(|name| name == pipeline_name)
            })
            .cloned()
            .collect())
    }

    async fn create(&self, run: &PipelineRun) -> Result<PipelineRun, StoreError> {
        let mut runs = self.runs.write().await;
        let mut stored = run.clone();
        if stored.metadata.name.is_empty() {
            let prefix = stored
                .metadata
                .generate_name
                .clone()
                .ok_or_else(|| StoreError::Backend("record has neither name nor generate_name".into()))?;
            loop {
                let suffix: String = Uuid::new_v4().simple().to_string()[..5].to_string();
                let candidate = format!("{prefix}{suffix}");
                let key = ObjectKey::new(stored.metadata.namespace.clone(), candidate.clone());
                if !runs.contains_key(&key) {
                    stored.metadata.name = candidate;
                    break;
                }
            }
        }
        let key = stored.metadata.key();
        if runs.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        stored.metadata.resource_version = 1;
        runs.insert(key.clone(), stored.clone());
        drop(runs);
        self.log(WriteOp::Create(key)).await;
        Ok(stored)
    }

    async fn update_metadata(&self, run: &PipelineRun) -> Result<PipelineRun, StoreError> {
        let key = run.metadata.key();
        let mut runs = self.runs.write().await;
        let stored = runs
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if stored.metadata.resource_version != run.metadata.resource_version {
            return Err(StoreError::Conflict(key));
        }
        stored.metadata.labels = run.metadata.labels.clone();
        stored.metadata.annotations = run.metadata.annotations.clone();
        stored.metadata.finalizers = run.metadata.finalizers.clone();
        stored.metadata.resource_version += 1;
        let updated = stored.clone();
        drop(runs);
        self.log(WriteOp::Metadata(key)).await;
        Ok(updated)
    }

    async fn update_status(&self, run: &PipelineRun) -> Result<PipelineRun, StoreError> {
        let key = run.metadata.key();
        let mut runs = self.runs.write().await;
        let stored = runs
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if stored.metadata.resource_version != run.metadata.resource_version {
            return Err(StoreError::Conflict(key));
        }
        stored.status = run.status.clone();
        stored.metadata.resource_version += 1;
        let updated = stored.clone();
        drop(runs);
        self.log(WriteOp::Status(key)).await;
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        let stored = runs
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if stored.metadata.finalizers.is_empty() {
            runs.remove(key);
        } else if stored.metadata.deletion_timestamp.is_none() {
            stored.metadata.deletion_timestamp = Some(Utc::now());
            stored.metadata.resource_version += 1;
        }
        drop(runs);
        self.log(WriteOp::Delete(key.clone())).await;
        Ok(())
    }
}

/// In-memory pipeline definition store.
#[derive(Clone, Default)]
pub struct InMemoryPipelineStore {
    pipelines: Arc<RwLock<HashMap<ObjectKey, Pipeline>>>,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, mut pipeline: Pipeline) -> Pipeline {
        pipeline.metadata.resource_version = 1;
        let key = pipeline.metadata.key();
        self.pipelines.write().await.insert(key, pipeline.clone());
        pipeline
    }
}

#[async_trait]
impl PipelineStore for InMemoryPipelineStore {
    async fn get(&self, key: &ObjectKey) -> Result<Pipeline, StoreError> {
        self.pipelines
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn update_metadata(&self, pipeline: &Pipeline) -> Result<Pipeline, StoreError> {
        let key = pipeline.metadata.key();
        let mut pipelines = self.pipelines.write().await;
        let stored = pipelines
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if stored.metadata.resource_version != pipeline.metadata.resource_version {
            return Err(StoreError::Conflict(key));
        }
        stored.metadata.labels = pipeline.metadata.labels.clone();
        stored.metadata.annotations = pipeline.metadata.annotations.clone();
        stored.metadata.resource_version += 1;
        Ok(stored.clone())
    }
}
