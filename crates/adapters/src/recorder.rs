//! Recording event recorder
//!
//! Collects emitted lifecycle events in memory. Used as the wiring default
//! where no external event sink exists, and by tests to assert on emitted
//! reasons.

use runway_core::ObjectKey;
use runway_ports::{EventRecorder, EventType};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub subject: ObjectKey,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
}

#[derive(Default)]
pub struct RecordingEventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<RecordedEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn reasons(&self) -> Vec<String> {
        match self.events.lock() {
            Ok(events) => events.iter().map(|e| e.reason.clone()).collect(),
            Err(poisoned) => poisoned.into_inner().iter().map(|e| e.reason.clone()).collect(),
        }
    }
}

impl EventRecorder for RecordingEventRecorder {
    fn event(&self, subject: &ObjectKey, event_type: EventType, reason: &str, message: String) {
        let recorded = RecordedEvent {
            subject: subject.clone(),
            event_type,
            reason: reason.to_string(),
            message,
        };
        match self.events.lock() {
            Ok(mut events) => events.push(recorded),
            Err(poisoned) => poisoned.into_inner().push(recorded),
        }
    }
}
