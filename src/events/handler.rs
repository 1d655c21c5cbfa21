//! Event handler trait and events

use crate::model::{DependencyBuildState, ObjectKey};
use std::sync::Mutex;

/// Events emitted while reconciling records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A Building record has no attempt to observe
    NoPipelineRun { build: ObjectKey },

    /// The source coordinates changed and all history was dropped
    IdentityChanged {
        build: ObjectKey,
        previous: Option<String>,
        identity: String,
    },

    AttemptSubmitted {
        build: ObjectKey,
        attempt: String,
        recipe: String,
    },

    AttemptCompleted {
        build: ObjectKey,
        attempt: String,
        succeeded: bool,
        contaminants: usize,
    },

    StateChanged {
        build: ObjectKey,
        from: DependencyBuildState,
        to: DependencyBuildState,
    },

    /// A rebuild request now references the contaminated build
    ContaminantLinked {
        build: ObjectKey,
        gav: String,
        request: String,
        created: bool,
    },

    /// The membership filter blob was rewritten
    FilterRebuilt {
        blob: ObjectKey,
        items: usize,
        bytes: usize,
    },
}

impl ReconcileEvent {
    /// Warning events are the ones an operator should look at
    pub fn is_warning(&self) -> bool {
        matches!(self, ReconcileEvent::NoPipelineRun { .. })
    }
}

pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &ReconcileEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl EventHandler for NoOpHandler {
    fn on_event(&self, _event: &ReconcileEvent) {}
}

/// Handler that keeps every event, for inspection by tests and the CLI
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<ReconcileEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReconcileEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&ReconcileEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|event| predicate(event)).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl EventHandler for RecordingHandler {
    fn on_event(&self, event: &ReconcileEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
