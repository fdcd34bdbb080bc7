//! Adapters - Infrastructure Implementations
//!
//! In-memory implementations of the store and recorder ports. They enforce
//! the same optimistic-concurrency contract a real object store exposes
//! (stale resource versions are rejected with a conflict), which makes them
//! suitable both for wiring and for integration tests of the reconcilers.

pub mod memory;
pub mod recorder;

pub use crate::memory::{InMemoryPipelineStore, InMemoryRunStore, WriteOp};
pub use crate::recorder::{RecordedEvent, RecordingEventRecorder};
