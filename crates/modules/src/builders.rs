//! Record and request builders
//!
//! Pure, side-effect-free functions for deriving a source-control
//! reference from a run spec and for constructing bare run records from a
//! pipeline definition. Used by the API-facing collaborator and by the
//! synchronizer's backfill path.

use runway_core::{
    DomainError, ObjectMeta, OwnerReference, Parameter, Pipeline, PipelineRef, PipelineRun,
    PipelineRunSpec, PipelineSpec, ScmRef,
};
use runway_ports::RemoteRun;
use serde::Deserialize;

/// Externally supplied trigger payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunPayload {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// Derive the source-control ref name for a run.
///
/// Returns `None` for plain pipelines. A multi-branch run without a ref
/// name is a misconfigured record and yields a validation error.
pub fn scm_ref_name(spec: &PipelineRunSpec) -> Result<Option<String>, DomainError> {
    if !spec.is_multi_branch() {
        return Ok(None);
    }
    match spec.scm.as_ref() {
        Some(scm) if !scm.ref_name.is_empty() => Ok(Some(scm.ref_name.clone())),
        _ => Err(DomainError::Validation(
            "failed to obtain SCM reference name for multi-branch pipeline".into(),
        )),
    }
}

/// Build the SCM reference for a new run of the given pipeline.
///
/// The reference type cannot be determined here, so only the name is set.
pub fn create_scm(spec: &PipelineSpec, branch: &str) -> Result<Option<ScmRef>, DomainError> {
    if !spec.is_multi_branch() {
        return Ok(None);
    }
    if branch.is_empty() {
        return Err(DomainError::Validation(
            "missing branch name for running a multi-branch pipeline".into(),
        ));
    }
    Ok(Some(ScmRef {
        ref_name: branch.to_string(),
        ref_type: String::new(),
    }))
}

/// Convert payload parameters, dropping entries with an empty name or value.
pub fn convert_parameters(payload: Option<&RunPayload>) -> Vec<Parameter> {
    payload
        .map(|p| {
            p.parameters
                .iter()
                .filter(|param| !param.name.is_empty() && !param.value.is_empty())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// The branch name the engine reports for a remote run.
pub fn remote_branch_name(run: &RemoteRun) -> Option<&str> {
    run.branch.as_ref().map(|branch| branch.url.as_str())
}

/// Construct a bare run record from a pipeline definition.
///
/// The record carries a generated-name prefix, a controller owner
/// reference and an empty annotation map; the caller decides whether to
/// add the engine run id before persisting.
pub fn create_pipeline_run(
    pipeline: &Pipeline,
    payload: Option<&RunPayload>,
    scm: Option<ScmRef>,
) -> PipelineRun {
    let metadata = ObjectMeta {
        namespace: pipeline.metadata.namespace.clone(),
        name: String::new(),
        generate_name: Some(format!("{}-", pipeline.metadata.name)),
        owner_references: vec![OwnerReference {
            kind: "Pipeline".to_string(),
            name: pipeline.metadata.name.clone(),
            controller: true,
        }],
        ..ObjectMeta::default()
    };
    let spec = PipelineRunSpec {
        pipeline_ref: Some(PipelineRef {
            kind: "Pipeline".to_string(),
            namespace: pipeline.metadata.namespace.clone(),
            name: pipeline.metadata.name.clone(),
        }),
        scm,
        parameters: convert_parameters(payload),
        pipeline_spec: Some(pipeline.spec.clone()),
        disabled: false,
    };
    PipelineRun::new(metadata, spec)
}
