//! Run Set Synchronizer
//!
//! Reconciles the set of local run records against the engine's run
//! history for one pipeline: every remote run gains a local bare record
//! carrying its run id annotation, so the run reconciler's "already
//! started" check holds on first observation and nothing is ever
//! double-triggered. This component never triggers or polls; it only
//! backfills bookkeeping for runs that originated outside this control
//! loop.

use crate::builders;
use crate::mutator::{self, ConflictRetryConfig};
use runway_core::{keys, DomainError, ObjectKey, Pipeline, PipelineRun};
use runway_ports::{
    reason, CiEngineClient, EventRecorder, EventType, PipelineCoordinates, PipelineRunStore,
    PipelineStore, RemoteRun, StoreError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Backfills bare run records for one pipeline's remote run history.
pub struct RunSynchronizer<RS, PS, CE, ER>
where
    RS: PipelineRunStore,
    PS: PipelineStore,
    CE: CiEngineClient,
    ER: EventRecorder,
{
    runs: Arc<RS>,
    pipelines: Arc<PS>,
    engine: Arc<CE>,
    recorder: Arc<ER>,
    retry: ConflictRetryConfig,
}

impl<RS, PS, CE, ER> RunSynchronizer<RS, PS, CE, ER>
where
    RS: PipelineRunStore,
    PS: PipelineStore,
    CE: CiEngineClient,
    ER: EventRecorder,
{
    pub fn new(
        runs: Arc<RS>,
        pipelines: Arc<PS>,
        engine: Arc<CE>,
        recorder: Arc<ER>,
        retry: ConflictRetryConfig,
    ) -> Self {
        Self {
            runs,
            pipelines,
            engine,
            recorder,
            retry,
        }
    }

    /// Run one sync pass for the pipeline. Entry point for the
    /// watch/informer layer, invoked when the sync-request marker is set.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<(), DomainError> {
        let pipeline = match self.pipelines.get(key).await {
            Ok(pipeline) => pipeline,
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let local_runs = self
            .runs
            .list_for_pipeline(&key.namespace, &key.name)
            .await
            .map_err(DomainError::from)?;
        let known_run_ids: HashMap<&str, &PipelineRun> = local_runs
            .iter()
            .filter_map(|run| run.engine_run_id().map(|id| (id, run)))
            .collect();

        let coordinates = PipelineCoordinates::new(key.namespace.clone(), key.name.clone());
        let remote_runs = match self.engine.list_runs(&coordinates).await {
            Ok(runs) => runs,
            Err(err) => {
                self.recorder.event(
                    key,
                    EventType::Warning,
                    reason::FAILED_PIPELINE_RUN_SYNC,
                    format!("Failed to list runs from the engine: {err}"),
                );
                return Err(err.into());
            }
        };

        let mut created = 0usize;
        for remote in &remote_runs {
            if known_run_ids.contains_key(remote.id.as_str()) {
                continue;
            }
            // best effort: one bad remote run must not abort the batch
            match self.create_bare_run(&pipeline, remote).await {
                Ok(_) => created += 1,
                Err(err) => error!(
                    pipeline = %key,
                    run_id = %remote.id,
                    error = %err,
                    "failed to create bare pipeline run"
                ),
            }
        }

        mutator::remove_pipeline_annotation(
            self.pipelines.as_ref(),
            key,
            keys::REQUEST_SYNC_RUNS_ANNOTATION,
            &self.retry,
        )
        .await?;

        info!(pipeline = %key, created, "synchronized pipeline runs");
        self.recorder.event(
            key,
            EventType::Normal,
            reason::PIPELINE_RUN_SYNCED,
            format!(
                "Successfully synchronized {created} pipeline run(s). Local/remote proportion is {}/{}",
                local_runs.len(),
                remote_runs.len()
            ),
        );
        Ok(())
    }

    async fn create_bare_run(
        &self,
        pipeline: &Pipeline,
        remote: &RemoteRun,
    ) -> Result<PipelineRun, DomainError> {
        let branch = builders::remote_branch_name(remote).unwrap_or_default();
        let scm = builders::create_scm(&pipeline.spec, branch)?;
        let mut run = builders::create_pipeline_run(pipeline, None, scm);
        run.metadata.labels.insert(
            keys::PIPELINE_NAME_LABEL.to_string(),
            pipeline.metadata.name.clone(),
        );
        // the run id must be present from the very first observation
        run.metadata.annotations.insert(
            keys::ENGINE_RUN_ID_ANNOTATION.to_string(),
            remote.id.clone(),
        );
        self.runs.create(&run).await.map_err(DomainError::from)
    }
}
