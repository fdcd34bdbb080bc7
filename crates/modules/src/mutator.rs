//! Conflict-safe record mutation
//!
//! All metadata and status writes from the reconcilers go through these
//! helpers. Each one re-fetches the latest version of the record, skips the
//! write when the desired state is already present, and retries
//! version-conflict rejections a bounded number of times with growing
//! backoff before surfacing them.

use runway_core::{keys, DomainError, ObjectKey, PipelineRun, PipelineRunStatus};
use runway_ports::{PipelineRunStore, PipelineStore, StoreError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounds for the optimistic-concurrency retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRetryConfig {
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further attempt.
    pub base_delay: Duration,
}

impl Default for ConflictRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
        }
    }
}

/// Run a read-mutate-write closure, retrying version conflicts.
///
/// Only [`StoreError::Conflict`] is retried; any other outcome is returned
/// as is. After the attempt budget is exhausted the final conflict is
/// surfaced to the caller.
pub async fn retry_on_conflict<T, F, Fut>(
    config: &ConflictRetryConfig,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = config.base_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(StoreError::Conflict(key)) if attempt < config.max_attempts => {
                debug!(record = %key, attempt, "version conflict while updating record, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Persist the desired labels and annotations of a run, ensuring the
/// cleanup finalizer is present. No-op when the stored record already
/// matches, so repeated reconciles do not bump versions spuriously.
pub async fn update_labels_and_annotations<S>(
    store: &S,
    key: &ObjectKey,
    desired: &PipelineRun,
    config: &ConflictRetryConfig,
) -> Result<(), DomainError>
where
    S: PipelineRunStore + ?Sized,
{
    retry_on_conflict(config, || async move {
        let mut latest = store.get(key).await?;
        if latest.metadata.labels == desired.metadata.labels
            && latest.metadata.annotations == desired.metadata.annotations
            && latest.metadata.has_finalizer(keys::RUN_FINALIZER)
        {
            return Ok(());
        }
        latest.metadata.labels = desired.metadata.labels.clone();
        latest.metadata.annotations = desired.metadata.annotations.clone();
        latest.metadata.ensure_finalizer(keys::RUN_FINALIZER);
        store.update_metadata(&latest).await.map(|_| ())
    })
    .await
    .map_err(DomainError::from)
}

/// Persist the desired status through the status sub-resource.
pub async fn update_status<S>(
    store: &S,
    key: &ObjectKey,
    desired: &PipelineRunStatus,
    config: &ConflictRetryConfig,
) -> Result<(), DomainError>
where
    S: PipelineRunStore + ?Sized,
{
    retry_on_conflict(config, || async move {
        let mut latest = store.get(key).await?;
        if latest.status == *desired {
            return Ok(());
        }
        latest.status = desired.clone();
        store.update_status(&latest).await.map(|_| ())
    })
    .await
    .map_err(DomainError::from)
}

/// Remove an annotation from a pipeline definition. No-op when absent.
pub async fn remove_pipeline_annotation<S>(
    store: &S,
    key: &ObjectKey,
    annotation: &str,
    config: &ConflictRetryConfig,
) -> Result<(), DomainError>
where
    S: PipelineStore + ?Sized,
{
    retry_on_conflict(config, || async move {
        let mut latest = store.get(key).await?;
        if latest.metadata.annotations.remove(annotation).is_none() {
            return Ok(());
        }
        store.update_metadata(&latest).await.map(|_| ())
    })
    .await
    .map_err(DomainError::from)
}
