//! Reconcile events emitted by the dependency build state machine

mod handler;
mod logging;

pub use handler::{EventHandler, NoOpHandler, ReconcileEvent, RecordingHandler};
pub use logging::LoggingHandler;
