//! Run Reconciler
//!
//! Single-run state machine: given a run record identity, advance that run
//! exactly one step toward convergence with the external CI engine and
//! return a re-invocation hint. The state is derived from record fields on
//! every pass, never stored; the engine run id annotation doubles as the
//! duplicate-trigger guard. Safe to re-invoke arbitrarily: the surrounding
//! delivery layer serializes invocations per identity.

use crate::builders;
use crate::mutator::{self, ConflictRetryConfig};
use chrono::Utc;
use runway_core::{
    keys, Condition, ConditionStatus, ConditionType, DomainError, ObjectKey, Pipeline,
    PipelineRun, PipelineRunStatus, RunPhase,
};
use runway_ports::{
    reason, run_result, run_state, CiEngineClient, EngineError, EventRecorder, EventType,
    PipelineCoordinates, PipelineRunStore, PipelineStore, RemoteRun, StoreError, TriggerOptions,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for the run reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReconcilerConfig {
    /// Delay before the first poll after triggering.
    pub requeue_after_trigger: Duration,
    /// Fixed polling interval while a run id is present.
    pub poll_interval: Duration,
    pub retry: ConflictRetryConfig,
}

impl Default for RunReconcilerConfig {
    fn default() -> Self {
        Self {
            requeue_after_trigger: Duration::from_secs(1),
            poll_interval: Duration::from_secs(3),
            retry: ConflictRetryConfig::default(),
        }
    }
}

/// Re-invocation hint returned by a reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn after(delay: Duration) -> Self {
        Self {
            requeue_after: Some(delay),
        }
    }
}

/// Reconciles one pipeline run record against the external engine.
pub struct RunReconciler<RS, PS, CE, ER>
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
    config: RunReconcilerConfig,
}

impl<RS, PS, CE, ER> RunReconciler<RS, PS, CE, ER>
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
        config: RunReconcilerConfig,
    ) -> Self {
        Self {
            runs,
            pipelines,
            engine,
            recorder,
            config,
        }
    }

    /// Advance the run one step. Entry point for the watch/informer layer.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, DomainError> {
        let run = match self.runs.get(key).await {
            Ok(run) => run,
            Err(StoreError::NotFound(_)) => {
                debug!(record = %key, "pipeline run vanished, nothing to do");
                return Ok(ReconcileOutcome::done());
            }
            Err(err) => return Err(err.into()),
        };

        // deletion always takes precedence over forward progress
        if run.is_deleting() {
            return self.finalize(run).await;
        }

        if !run.buildable() {
            return Ok(ReconcileOutcome::done());
        }

        let pipeline_name = match run.spec.pipeline_ref.as_ref() {
            Some(pipeline_ref) if !pipeline_ref.name.is_empty() => pipeline_ref.name.clone(),
            _ => return self.mark_orphan(key, run).await,
        };

        let pipeline_key = ObjectKey::new(key.namespace.clone(), pipeline_name);
        let pipeline = match self.pipelines.get(&pipeline_key).await {
            Ok(pipeline) => pipeline,
            Err(StoreError::NotFound(_)) => {
                warn!(record = %key, pipeline = %pipeline_key, "referenced pipeline not found");
                return Ok(ReconcileOutcome::done());
            }
            Err(err) => return Err(err.into()),
        };

        let mut run = run;
        run.metadata.labels.insert(
            keys::PIPELINE_NAME_LABEL.to_string(),
            pipeline.metadata.name.clone(),
        );
        if let Ok(Some(ref_name)) = builders::scm_ref_name(&run.spec) {
            run.metadata
                .labels
                .insert(keys::SCM_REF_NAME_LABEL.to_string(), ref_name);
        }

        if run.has_started() {
            self.poll(key, run, &pipeline).await
        } else {
            self.trigger(key, run, &pipeline).await
        }
    }

    /// Deletion branch: best-effort engine history cleanup, then strip the
    /// finalizer so the store can remove the record.
    async fn finalize(&self, mut run: PipelineRun) -> Result<ReconcileOutcome, DomainError> {
        let key = run.metadata.key();
        if let Err(err) = self.delete_engine_history(&run).await {
            debug!(record = %key, error = %err, "failed to delete engine build history");
            return Err(err);
        }
        run.metadata.remove_finalizer(keys::RUN_FINALIZER);
        self.runs.update_metadata(&run).await?;
        Ok(ReconcileOutcome::done())
    }

    async fn delete_engine_history(&self, run: &PipelineRun) -> Result<(), DomainError> {
        // no valid build number means there is nothing to clean up
        let Some(build_number) = run.engine_run_id().and_then(|id| id.parse::<i64>().ok()) else {
            return Ok(());
        };
        let Some(pipeline_ref) = run.spec.pipeline_ref.as_ref() else {
            return Ok(());
        };
        let coordinates = PipelineCoordinates::new(
            run.metadata.namespace.clone(),
            pipeline_ref.name.clone(),
        );
        match self.engine.delete_history(&coordinates, build_number).await {
            // an already-absent build record counts as cleaned up
            Ok(()) | Err(EngineError::NotFound) => Ok(()),
            Err(err) => Err(DomainError::Infrastructure(format!(
                "failed to delete build history for {coordinates} build {build_number}: {err}"
            ))),
        }
    }

    /// The record has no pipeline reference; mark it and stop until an
    /// external actor corrects the spec.
    async fn mark_orphan(
        &self,
        key: &ObjectKey,
        mut run: PipelineRun,
    ) -> Result<ReconcileOutcome, DomainError> {
        warn!(record = %key, "pipeline run has no pipeline reference, marking as orphan");
        run.label_as_orphan();
        mutator::update_labels_and_annotations(self.runs.as_ref(), key, &run, &self.config.retry)
            .await?;

        let mut status = run.status.clone();
        status.add_condition(Condition::new(
            ConditionType::Succeeded,
            ConditionStatus::Unknown,
            "SKIPPED",
            "skipped reconciling this run: no pipeline reference on the record",
        ));
        status.phase = RunPhase::Unknown;
        mutator::update_status(self.runs.as_ref(), key, &status, &self.config.retry).await?;
        Ok(ReconcileOutcome::done())
    }

    /// First pass for an untriggered run: call the engine and persist the
    /// returned run id before anything else observes the record.
    async fn trigger(
        &self,
        key: &ObjectKey,
        mut run: PipelineRun,
        pipeline: &Pipeline,
    ) -> Result<ReconcileOutcome, DomainError> {
        // a multi-branch run without a ref is misconfigured; fail before
        // any engine call
        let branch = builders::scm_ref_name(&run.spec)?;
        let options = TriggerOptions {
            coordinates: PipelineCoordinates::new(
                pipeline.metadata.namespace.clone(),
                pipeline.metadata.name.clone(),
            ),
            branch,
            parameters: run.spec.parameters.clone(),
        };
        let remote = match self.engine.trigger(options).await {
            Ok(remote) => remote,
            Err(err) => {
                error!(record = %key, error = %err, "unable to trigger the pipeline run");
                self.recorder.event(
                    key,
                    EventType::Warning,
                    reason::TRIGGER_FAILED,
                    format!("Failed to trigger pipeline run {key}: {err}"),
                );
                return Err(err.into());
            }
        };
        info!(record = %key, run_id = %remote.id, "triggered a pipeline run");

        run.metadata.annotations.insert(
            keys::ENGINE_RUN_ID_ANNOTATION.to_string(),
            remote.id.clone(),
        );
        mutator::update_labels_and_annotations(self.runs.as_ref(), key, &run, &self.config.retry)
            .await?;

        let now = Utc::now();
        let mut status = run.status.clone();
        status.start_time = Some(now);
        status.update_time = Some(now);
        mutator::update_status(self.runs.as_ref(), key, &status, &self.config.retry).await?;

        self.recorder.event(
            key,
            EventType::Normal,
            reason::STARTED,
            format!("Started pipeline run {key}"),
        );
        Ok(ReconcileOutcome::after(self.config.requeue_after_trigger))
    }

    /// Polling pass for a started run: snapshot the remote result and stage
    /// tree into annotations, then translate the result into local status.
    async fn poll(
        &self,
        key: &ObjectKey,
        mut run: PipelineRun,
        pipeline: &Pipeline,
    ) -> Result<ReconcileOutcome, DomainError> {
        let branch = builders::scm_ref_name(&run.spec)?;
        let run_id = run
            .engine_run_id()
            .map(str::to_string)
            .ok_or_else(|| {
                DomainError::Validation("missing engine run id on a started pipeline run".into())
            })?;
        let coordinates = PipelineCoordinates::new(
            pipeline.metadata.namespace.clone(),
            pipeline.metadata.name.clone(),
        );

        let remote = match self
            .engine
            .fetch_result(&coordinates, branch.as_deref(), &run_id)
            .await
        {
            Ok(remote) => remote,
            Err(err) => {
                error!(record = %key, error = %err, "unable to retrieve run data from the engine");
                self.recorder.event(
                    key,
                    EventType::Warning,
                    reason::RETRIEVE_FAILED,
                    format!("Failed to retrieve running data from the engine: {err}"),
                );
                return Err(err.into());
            }
        };
        let stages = match self
            .engine
            .fetch_stages(&coordinates, branch.as_deref(), &run_id)
            .await
        {
            Ok(stages) => stages,
            Err(err) => {
                error!(record = %key, error = %err, "unable to retrieve stage detail from the engine");
                self.recorder.event(
                    key,
                    EventType::Warning,
                    reason::RETRIEVE_FAILED,
                    format!("Failed to retrieve stage detail from the engine: {err}"),
                );
                return Err(err.into());
            }
        };

        let result_snapshot = serde_json::to_string(&remote)
            .map_err(|err| DomainError::Serialization(err.to_string()))?;
        let stages_snapshot = serde_json::to_string(&stages)
            .map_err(|err| DomainError::Serialization(err.to_string()))?;
        run.metadata.annotations.insert(
            keys::ENGINE_RUN_STATUS_ANNOTATION.to_string(),
            result_snapshot,
        );
        run.metadata.annotations.insert(
            keys::ENGINE_RUN_STAGES_ANNOTATION.to_string(),
            stages_snapshot,
        );

        // annotations must land before the status they justify
        mutator::update_labels_and_annotations(self.runs.as_ref(), key, &run, &self.config.retry)
            .await?;

        let mut status = run.status.clone();
        apply_remote_run(&remote, &mut status);
        mutator::update_status(self.runs.as_ref(), key, &status, &self.config.retry).await?;

        self.recorder.event(
            key,
            EventType::Normal,
            reason::UPDATED,
            format!("Updated running data for pipeline run {key}"),
        );

        // keep polling even after a terminal result; only deletion or
        // ineligibility stops this loop
        Ok(ReconcileOutcome::after(self.config.poll_interval))
    }
}

/// Translate a remote run summary into local phase, conditions and
/// timestamps.
pub fn apply_remote_run(remote: &RemoteRun, status: &mut PipelineRunStatus) {
    status.update_time = Some(Utc::now());
    if let Some(start) = remote.start_time {
        status.start_time = Some(start);
    }

    match remote.state.as_deref() {
        Some(run_state::QUEUED) | Some(run_state::NOT_BUILT) | Some(run_state::PAUSED) => {
            status.phase = RunPhase::Pending;
            status.add_condition(Condition::new(
                ConditionType::Succeeded,
                ConditionStatus::Unknown,
                remote.state.as_deref().unwrap_or_default(),
                "",
            ));
        }
        Some(run_state::RUNNING) => {
            status.phase = RunPhase::Running;
            status.add_condition(Condition::new(
                ConditionType::Ready,
                ConditionStatus::True,
                run_state::RUNNING,
                "",
            ));
            status.add_condition(Condition::new(
                ConditionType::Succeeded,
                ConditionStatus::Unknown,
                run_state::RUNNING,
                "",
            ));
        }
        Some(run_state::FINISHED) => {
            let (phase, condition_status) = match remote.result.as_deref() {
                Some(run_result::SUCCESS) => (RunPhase::Succeeded, ConditionStatus::True),
                Some(run_result::FAILURE) | Some(run_result::FAILED) | Some(run_result::UNSTABLE) => {
                    (RunPhase::Failed, ConditionStatus::False)
                }
                Some(run_result::ABORTED) => (RunPhase::Cancelled, ConditionStatus::False),
                _ => (RunPhase::Unknown, ConditionStatus::Unknown),
            };
            status.phase = phase;
            if let Some(end) = remote.end_time {
                status.completion_time = Some(end);
            }
            status.add_condition(Condition::new(
                ConditionType::Succeeded,
                condition_status,
                remote.result.as_deref().unwrap_or(run_state::FINISHED),
                "",
            ));
        }
        _ => {
            status.phase = RunPhase::Unknown;
            status.add_condition(Condition::new(
                ConditionType::Succeeded,
                ConditionStatus::Unknown,
                run_result::UNKNOWN,
                "",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use runway_adapters::{InMemoryPipelineStore, InMemoryRunStore, RecordingEventRecorder};
    use runway_core::{ObjectMeta, PipelineRef, PipelineRunSpec, PipelineSpec, PipelineType};
    use runway_ports::StageNode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scriptable fake engine counting calls per operation.
    #[derive(Default)]
    struct MockEngine {
        run_id: String,
        remote_state: Option<String>,
        remote_result: Option<String>,
        fail_trigger: bool,
        fail_fetch: bool,
        fail_delete: bool,
        delete_not_found: bool,
        trigger_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        delete_calls: AtomicUsize,
    }

    impl MockEngine {
        fn with_run_id(run_id: &str) -> Self {
            Self {
                run_id: run_id.into(),
                ..Self::default()
            }
        }

        fn with_state(mut self, state: &str) -> Self {
            self.remote_state = Some(state.into());
            self
        }

        fn with_result(mut self, result: &str) -> Self {
            self.remote_result = Some(result.into());
            self
        }
    }

    #[async_trait]
    impl CiEngineClient for MockEngine {
        async fn trigger(&self, _options: TriggerOptions) -> Result<RemoteRun, EngineError> {
            self.trigger_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_trigger {
                return Err(EngineError::Remote("trigger refused".into()));
            }
            Ok(RemoteRun {
                id: self.run_id.clone(),
                state: Some(run_state::QUEUED.into()),
                ..RemoteRun::default()
            })
        }

        async fn fetch_result(
            &self,
            _coordinates: &PipelineCoordinates,
            _branch: Option<&str>,
            _run_id: &str,
        ) -> Result<RemoteRun, EngineError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err(EngineError::Remote("engine unavailable".into()));
            }
            Ok(RemoteRun {
                id: self.run_id.clone(),
                state: self.remote_state.clone(),
                result: self.remote_result.clone(),
                ..RemoteRun::default()
            })
        }

        async fn fetch_stages(
            &self,
            _coordinates: &PipelineCoordinates,
            _branch: Option<&str>,
            _run_id: &str,
        ) -> Result<Vec<StageNode>, EngineError> {
            if self.fail_fetch {
                return Err(EngineError::Remote("engine unavailable".into()));
            }
            Ok(vec![StageNode {
                id: "1".into(),
                display_name: "build".into(),
                state: self.remote_state.clone(),
                ..StageNode::default()
            }])
        }

        async fn list_runs(
            &self,
            _coordinates: &PipelineCoordinates,
        ) -> Result<Vec<RemoteRun>, EngineError> {
            Ok(Vec::new())
        }

        async fn delete_history(
            &self,
            _coordinates: &PipelineCoordinates,
            _build_number: i64,
        ) -> Result<(), EngineError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.delete_not_found {
                return Err(EngineError::NotFound);
            }
            if self.fail_delete {
                return Err(EngineError::Remote("delete refused".into()));
            }
            Ok(())
        }
    }

    struct Fixture {
        runs: Arc<InMemoryRunStore>,
        pipelines: Arc<InMemoryPipelineStore>,
        engine: Arc<MockEngine>,
        recorder: Arc<RecordingEventRecorder>,
        reconciler: RunReconciler<
            InMemoryRunStore,
            InMemoryPipelineStore,
            MockEngine,
            RecordingEventRecorder,
        >,
    }

    fn fixture(engine: MockEngine) -> Fixture {
        let runs = Arc::new(InMemoryRunStore::new());
        let pipelines = Arc::new(InMemoryPipelineStore::new());
        let engine = Arc::new(engine);
        let recorder = Arc::new(RecordingEventRecorder::new());
        let config = RunReconcilerConfig {
            retry: ConflictRetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
            ..RunReconcilerConfig::default()
        };
        let reconciler = RunReconciler::new(
            runs.clone(),
            pipelines.clone(),
            engine.clone(),
            recorder.clone(),
            config,
        );
        Fixture {
            runs,
            pipelines,
            engine,
            recorder,
            reconciler,
        }
    }

    fn pipeline(namespace: &str, name: &str, pipeline_type: PipelineType) -> Pipeline {
        Pipeline::new(
            ObjectMeta {
                namespace: namespace.into(),
                name: name.into(),
                ..ObjectMeta::default()
            },
            PipelineSpec {
                pipeline_type,
                definition: None,
            },
        )
    }

    fn run_for(pipeline: &Pipeline, name: &str) -> PipelineRun {
        PipelineRun::new(
            ObjectMeta {
                namespace: pipeline.metadata.namespace.clone(),
                name: name.into(),
                ..ObjectMeta::default()
            },
            PipelineRunSpec {
                pipeline_ref: Some(PipelineRef {
                    kind: "Pipeline".into(),
                    namespace: pipeline.metadata.namespace.clone(),
                    name: pipeline.metadata.name.clone(),
                }),
                pipeline_spec: Some(pipeline.spec.clone()),
                ..PipelineRunSpec::default()
            },
        )
    }

    #[tokio::test]
    async fn vanished_record_is_a_noop() {
        let f = fixture(MockEngine::default());
        let outcome = f
            .reconciler
            .reconcile(&ObjectKey::new("demo", "gone"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::done());
    }

    #[tokio::test]
    async fn disabled_run_is_not_advanced() {
        let f = fixture(MockEngine::with_run_id("7"));
        let pipeline = pipeline("demo", "pipeline-a", PipelineType::Plain);
        f.pipelines.seed(pipeline.clone()).await;
        let mut run = run_for(&pipeline, "run-1");
        run.spec.disabled = true;
        f.runs.seed(run).await;

        let outcome = f
            .reconciler
            .reconcile(&ObjectKey::new("demo", "run-1"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::done());
        assert_eq!(f.engine.trigger_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_without_pipeline_ref_becomes_orphan() {
        let f = fixture(MockEngine::default());
        let mut run = run_for(&pipeline("demo", "pipeline-a", PipelineType::Plain), "run-1");
        run.spec.pipeline_ref = None;
        f.runs.seed(run).await;

        let key = ObjectKey::new("demo", "run-1");
        f.reconciler.reconcile(&key).await.unwrap();

        let stored = f.runs.get(&key).await.unwrap();
        assert_eq!(
            stored.metadata.labels.get(keys::ORPHAN_LABEL),
            Some(&"true".to_string())
        );
        assert_eq!(stored.status.phase, RunPhase::Unknown);
        let condition = stored.status.condition(ConditionType::Succeeded).unwrap();
        assert_eq!(condition.status, ConditionStatus::Unknown);
        assert_eq!(condition.reason, "SKIPPED");
        assert_eq!(f.engine.trigger_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn multi_branch_without_ref_fails_before_any_engine_call() {
        let f = fixture(MockEngine::with_run_id("7"));
        let pipeline = pipeline("demo", "pipeline-mb", PipelineType::MultiBranch);
        f.pipelines.seed(pipeline.clone()).await;
        let run = run_for(&pipeline, "run-1");
        f.runs.seed(run).await;

        let err = f
            .reconciler
            .reconcile(&ObjectKey::new("demo", "run-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(f.engine.trigger_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.engine.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn trigger_persists_run_id_and_schedules_short_requeue() {
        let f = fixture(MockEngine::with_run_id("7"));
        let pipeline = pipeline("demo", "pipeline-a", PipelineType::Plain);
        f.pipelines.seed(pipeline.clone()).await;
        f.runs.seed(run_for(&pipeline, "run-1")).await;

        let key = ObjectKey::new("demo", "run-1");
        let outcome = f.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome.requeue_after, Some(Duration::from_secs(1)));

        let stored = f.runs.get(&key).await.unwrap();
        assert_eq!(stored.engine_run_id(), Some("7"));
        assert!(stored.metadata.has_finalizer(keys::RUN_FINALIZER));
        assert_eq!(
            stored.metadata.labels.get(keys::PIPELINE_NAME_LABEL),
            Some(&"pipeline-a".to_string())
        );
        assert!(stored.status.start_time.is_some());
        assert_eq!(f.recorder.reasons(), vec![reason::STARTED.to_string()]);
    }

    #[tokio::test]
    async fn trigger_failure_emits_warning_and_bubbles() {
        let f = fixture(MockEngine {
            fail_trigger: true,
            ..MockEngine::default()
        });
        let pipeline = pipeline("demo", "pipeline-a", PipelineType::Plain);
        f.pipelines.seed(pipeline.clone()).await;
        f.runs.seed(run_for(&pipeline, "run-1")).await;

        let key = ObjectKey::new("demo", "run-1");
        let err = f.reconciler.reconcile(&key).await.unwrap_err();
        assert!(matches!(err, DomainError::Infrastructure(_)));
        assert_eq!(
            f.recorder.reasons(),
            vec![reason::TRIGGER_FAILED.to_string()]
        );
        // no run id was persisted, a later pass may trigger again
        assert_eq!(f.runs.get(&key).await.unwrap().engine_run_id(), None);
    }

    #[tokio::test]
    async fn started_run_is_polled_not_retriggered() {
        let f = fixture(MockEngine::with_run_id("7").with_state(run_state::RUNNING));
        let pipeline = pipeline("demo", "pipeline-a", PipelineType::Plain);
        f.pipelines.seed(pipeline.clone()).await;
        let mut run = run_for(&pipeline, "run-1");
        run.metadata
            .annotations
            .insert(keys::ENGINE_RUN_ID_ANNOTATION.into(), "7".into());
        f.runs.seed(run).await;

        let key = ObjectKey::new("demo", "run-1");
        let outcome = f.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome.requeue_after, Some(Duration::from_secs(3)));
        assert_eq!(f.engine.trigger_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.engine.fetch_calls.load(Ordering::SeqCst), 1);

        let stored = f.runs.get(&key).await.unwrap();
        assert_eq!(stored.status.phase, RunPhase::Running);
        assert!(stored
            .metadata
            .annotations
            .contains_key(keys::ENGINE_RUN_STATUS_ANNOTATION));
        assert!(stored
            .metadata
            .annotations
            .contains_key(keys::ENGINE_RUN_STAGES_ANNOTATION));
        assert_eq!(f.recorder.reasons(), vec![reason::UPDATED.to_string()]);
    }

    #[tokio::test]
    async fn fetch_failure_emits_retrieve_failed_and_does_not_advance() {
        let f = fixture(MockEngine {
            run_id: "7".into(),
            fail_fetch: true,
            ..MockEngine::default()
        });
        let pipeline = pipeline("demo", "pipeline-a", PipelineType::Plain);
        f.pipelines.seed(pipeline.clone()).await;
        let mut run = run_for(&pipeline, "run-1");
        run.metadata
            .annotations
            .insert(keys::ENGINE_RUN_ID_ANNOTATION.into(), "7".into());
        f.runs.seed(run).await;

        let key = ObjectKey::new("demo", "run-1");
        let err = f.reconciler.reconcile(&key).await.unwrap_err();
        assert!(matches!(err, DomainError::Infrastructure(_)));
        assert_eq!(
            f.recorder.reasons(),
            vec![reason::RETRIEVE_FAILED.to_string()]
        );
        let stored = f.runs.get(&key).await.unwrap();
        assert_eq!(stored.status.phase, RunPhase::Unknown);
    }

    #[tokio::test]
    async fn deletion_with_absent_history_strips_finalizer() {
        let f = fixture(MockEngine {
            delete_not_found: true,
            ..MockEngine::default()
        });
        let pipeline = pipeline("demo", "pipeline-a", PipelineType::Plain);
        f.pipelines.seed(pipeline.clone()).await;
        let mut run = run_for(&pipeline, "run-1");
        run.metadata
            .annotations
            .insert(keys::ENGINE_RUN_ID_ANNOTATION.into(), "7".into());
        run.metadata.finalizers.push(keys::RUN_FINALIZER.into());
        run.metadata.deletion_timestamp = Some(Utc::now());
        f.runs.seed(run).await;

        let key = ObjectKey::new("demo", "run-1");
        let outcome = f.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::done());
        assert_eq!(f.engine.delete_calls.load(Ordering::SeqCst), 1);

        let stored = f.runs.get(&key).await.unwrap();
        assert!(!stored.metadata.has_finalizer(keys::RUN_FINALIZER));
    }

    #[tokio::test]
    async fn deletion_failure_keeps_finalizer_and_errors() {
        let f = fixture(MockEngine {
            fail_delete: true,
            ..MockEngine::default()
        });
        let pipeline = pipeline("demo", "pipeline-a", PipelineType::Plain);
        f.pipelines.seed(pipeline.clone()).await;
        let mut run = run_for(&pipeline, "run-1");
        run.metadata
            .annotations
            .insert(keys::ENGINE_RUN_ID_ANNOTATION.into(), "7".into());
        run.metadata.finalizers.push(keys::RUN_FINALIZER.into());
        run.metadata.deletion_timestamp = Some(Utc::now());
        f.runs.seed(run).await;

        let key = ObjectKey::new("demo", "run-1");
        let err = f.reconciler.reconcile(&key).await.unwrap_err();
        assert!(matches!(err, DomainError::Infrastructure(_)));
        let stored = f.runs.get(&key).await.unwrap();
        assert!(stored.metadata.has_finalizer(keys::RUN_FINALIZER));
    }

    #[tokio::test]
    async fn deletion_without_numeric_run_id_skips_engine_call() {
        let f = fixture(MockEngine::default());
        let pipeline = pipeline("demo", "pipeline-a", PipelineType::Plain);
        f.pipelines.seed(pipeline.clone()).await;
        let mut run = run_for(&pipeline, "run-1");
        run.metadata
            .annotations
            .insert(keys::ENGINE_RUN_ID_ANNOTATION.into(), "not-a-number".into());
        run.metadata.finalizers.push(keys::RUN_FINALIZER.into());
        run.metadata.deletion_timestamp = Some(Utc::now());
        f.runs.seed(run).await;

        f.reconciler
            .reconcile(&ObjectKey::new("demo", "run-1"))
            .await
            .unwrap();
        assert_eq!(f.engine.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remote_running_state_maps_to_running_phase() {
        let remote = RemoteRun {
            id: "7".into(),
            state: Some(run_state::RUNNING.into()),
            ..RemoteRun::default()
        };
        let mut status = PipelineRunStatus::default();
        apply_remote_run(&remote, &mut status);
        assert_eq!(status.phase, RunPhase::Running);
        assert_eq!(
            status.condition(ConditionType::Ready).map(|c| c.status),
            Some(ConditionStatus::True)
        );
        assert_eq!(
            status.condition(ConditionType::Succeeded).map(|c| c.status),
            Some(ConditionStatus::Unknown)
        );
    }

    #[test]
    fn remote_finished_results_map_to_terminal_phases() {
        let cases = [
            (run_result::SUCCESS, RunPhase::Succeeded, ConditionStatus::True),
            (run_result::FAILURE, RunPhase::Failed, ConditionStatus::False),
            (run_result::ABORTED, RunPhase::Cancelled, ConditionStatus::False),
            (run_result::UNKNOWN, RunPhase::Unknown, ConditionStatus::Unknown),
        ];
        for (result, phase, condition_status) in cases {
            let remote = RemoteRun {
                id: "7".into(),
                state: Some(run_state::FINISHED.into()),
                result: Some(result.into()),
                end_time: Some(Utc::now()),
                ..RemoteRun::default()
            };
            let mut status = PipelineRunStatus::default();
            apply_remote_run(&remote, &mut status);
            assert_eq!(status.phase, phase, "result {result}");
            assert_eq!(
                status.condition(ConditionType::Succeeded).map(|c| c.status),
                Some(condition_status)
            );
            assert!(status.completion_time.is_some());
        }
    }

    #[test]
    fn remote_queued_state_maps_to_pending() {
        let remote = RemoteRun {
            id: "7".into(),
            state: Some(run_state::QUEUED.into()),
            ..RemoteRun::default()
        };
        let mut status = PipelineRunStatus::default();
        apply_remote_run(&remote, &mut status);
        assert_eq!(status.phase, RunPhase::Pending);
    }
}
