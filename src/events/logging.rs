//! Logging-based event handler

use super::{EventHandler, ReconcileEvent};
use tracing::{debug, info, warn};

/// Handler that logs reconcile events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &ReconcileEvent) {
        match event {
            ReconcileEvent::NoPipelineRun { build } => {
                warn!(build = %build, "No pipeline run found for dependency build, restarting");
            }
            ReconcileEvent::IdentityChanged {
                build,
                previous,
                identity,
            } => {
                info!(
                    build = %build,
                    previous = previous.as_deref().unwrap_or("<none>"),
                    identity = %identity,
                    "Dependency build identity changed, history cleared"
                );
            }
            ReconcileEvent::AttemptSubmitted {
                build,
                attempt,
                recipe,
            } => {
                info!(build = %build, attempt = %attempt, recipe = %recipe, "Submitted build attempt");
            }
            ReconcileEvent::AttemptCompleted {
                build,
                attempt,
                succeeded,
                contaminants,
            } => {
                if *succeeded {
                    info!(build = %build, attempt = %attempt, contaminants, "Build attempt succeeded");
                } else {
                    warn!(build = %build, attempt = %attempt, "Build attempt failed");
                }
            }
            ReconcileEvent::StateChanged { build, from, to } => {
                info!(build = %build, from = %from, to = %to, "Dependency build state changed");
            }
            ReconcileEvent::ContaminantLinked {
                build,
                gav,
                request,
                created,
            } => {
                debug!(
                    build = %build,
                    gav = %gav,
                    request = %request,
                    created,
                    "Linked contaminant to artifact build request"
                );
            }
            ReconcileEvent::FilterRebuilt { blob, items, bytes } => {
                debug!(blob = %blob, items, bytes, "Rebuilt membership filter");
            }
        }
    }
}
