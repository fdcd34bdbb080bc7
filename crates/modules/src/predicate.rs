//! Watch event predicates
//!
//! The delivery layer applies these pure predicates to change
//! notifications before invoking the synchronizer, so that only pipelines
//! carrying the sync-request marker (and actually changed) get a pass.

use runway_core::{keys, ObjectMeta};

/// A change notification as delivered by the watch/informer layer.
#[derive(Debug, Clone, Copy)]
pub enum WatchEvent<'a> {
    Created(&'a ObjectMeta),
    Updated {
        old: &'a ObjectMeta,
        new: &'a ObjectMeta,
    },
    Deleted(&'a ObjectMeta),
    Generic(&'a ObjectMeta),
}

/// True when the event's subject requests a run sync. Deletions and
/// generic events never do.
pub fn requests_sync(event: &WatchEvent<'_>) -> bool {
    match event {
        WatchEvent::Created(meta) | WatchEvent::Updated { new: meta, .. } => meta
            .annotations
            .contains_key(keys::REQUEST_SYNC_RUNS_ANNOTATION),
        WatchEvent::Deleted(_) | WatchEvent::Generic(_) => false,
    }
}

/// True unless the event is an update that did not change the resource
/// version (an informer resync echo).
pub fn resource_version_changed(event: &WatchEvent<'_>) -> bool {
    match event {
        WatchEvent::Updated { old, new } => old.resource_version != new.resource_version,
        _ => true,
    }
}

/// Composition used to gate the synchronizer.
pub fn sync_needed(event: &WatchEvent<'_>) -> bool {
    resource_version_changed(event) && requests_sync(event)
}
