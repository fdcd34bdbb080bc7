//! Application Modules
//!
//! This crate contains the application layer (use cases) that drives run
//! records toward convergence with the external CI engine through the
//! ports: the single-run reconciler, the run-set synchronizer, the
//! conflict-safe mutator they both write through, and the pure builders
//! and watch predicates around them.

pub mod builders;
pub mod mutator;
pub mod predicate;
pub mod run_reconciler;
pub mod run_synchronizer;

pub use crate::builders::RunPayload;
pub use crate::mutator::ConflictRetryConfig;
pub use crate::predicate::WatchEvent;
pub use crate::run_reconciler::{ReconcileOutcome, RunReconciler, RunReconcilerConfig};
pub use crate::run_synchronizer::RunSynchronizer;
