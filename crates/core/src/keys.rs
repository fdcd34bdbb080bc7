//! Well-known metadata keys
//!
//! Annotation and label keys used as a secondary index on run records,
//! shared by the run reconciler and the set synchronizer.

/// Annotation holding the CI engine's own identifier for a triggered run.
/// Immutable once set; its presence is the duplicate-trigger guard.
pub const ENGINE_RUN_ID_ANNOTATION: &str = "runway.dev/engine-run-id";

/// Annotation holding the latest serialized snapshot of the remote run result.
pub const ENGINE_RUN_STATUS_ANNOTATION: &str = "runway.dev/engine-run-status";

/// Annotation holding the latest serialized snapshot of the remote stage tree.
pub const ENGINE_RUN_STAGES_ANNOTATION: &str = "runway.dev/engine-run-stages";

/// Pipeline-level marker requesting a run-history sync pass.
/// Added externally, removed by the synchronizer once the pass completes.
pub const REQUEST_SYNC_RUNS_ANNOTATION: &str = "runway.dev/request-sync-runs";

/// Label carrying the owning pipeline name, used for indexed lookup.
pub const PIPELINE_NAME_LABEL: &str = "runway.dev/pipeline";

/// Label carrying the source-control ref name (multi-branch runs only).
pub const SCM_REF_NAME_LABEL: &str = "runway.dev/scm-ref-name";

/// Label marking a run whose pipeline reference cannot be resolved.
pub const ORPHAN_LABEL: &str = "runway.dev/orphan";

/// Finalizer deferring physical removal until engine history cleanup.
pub const RUN_FINALIZER: &str = "runway.dev/pipelinerun-cleanup";
