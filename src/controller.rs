//! Controller driving the reconcilers
//!
//! A pass lists every dependency build in the namespace and evaluates each
//! one until it stops making progress, then refreshes the membership filter.
//! Passes are repeated on a fixed interval in watch mode.

use crate::config::ServiceConfig;
use crate::events::EventHandler;
use crate::identity::DEPENDENCY_BUILD_ID_LABEL;
use crate::model::{BuildAttempt, DependencyBuild, LabelSelector, ObjectKey, Resource};
use crate::recipe::RecipeCatalog;
use crate::reconciler::{
    reconcile_with_timeout, DependencyBuildReconciler, FilterOutcome, ReconcileError,
    ReconcileOutcome, RebuiltArtifactReconciler,
};
use crate::store::Store;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Upper bound on evaluations of one record within a pass
const MAX_STEPS_PER_PASS: usize = 16;

/// Totals for one controller pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub builds: usize,
    pub evaluations: usize,
    pub transitions: usize,
    pub errors: usize,
    pub filter_written: bool,
}

pub struct Controller {
    config: Arc<ServiceConfig>,
    store: Arc<dyn Store>,
    catalog: Arc<RecipeCatalog>,
    builds: DependencyBuildReconciler,
    artifacts: RebuiltArtifactReconciler,
}

impl Controller {
    pub fn new(
        config: Arc<ServiceConfig>,
        store: Arc<dyn Store>,
        events: Arc<dyn EventHandler>,
    ) -> Self {
        let catalog = Arc::new(RecipeCatalog::from_images(config.builder_images.clone()));
        let builds = DependencyBuildReconciler::new(store.clone(), catalog.clone(), events.clone());
        let artifacts =
            RebuiltArtifactReconciler::new(store.clone(), config.filter_name.clone(), events);

        Self {
            config,
            store,
            catalog,
            builds,
            artifacts,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RecipeCatalog {
        &self.catalog
    }

    pub fn artifacts(&self) -> &RebuiltArtifactReconciler {
        &self.artifacts
    }

    /// Replace the builder images with those from a flat system config map
    pub fn reload_builders(&self, system_config: &HashMap<String, String>) -> usize {
        let loaded = self.catalog.load_system_config(system_config);
        info!(builders = loaded, "Reloaded builder images");
        loaded
    }

    /// Evaluate one dependency build until it stops making progress
    pub async fn settle(&self, key: &ObjectKey) -> Result<Vec<ReconcileOutcome>, ReconcileError> {
        let timeout = self.config.reconcile_timeout();
        let mut outcomes = Vec::new();

        for _ in 0..MAX_STEPS_PER_PASS {
            let outcome = reconcile_with_timeout(&self.builds, key, timeout).await?;
            let progressed = outcome.made_progress();
            outcomes.push(outcome);
            if !progressed {
                return Ok(outcomes);
            }
        }

        debug!(build = %key, steps = MAX_STEPS_PER_PASS, "Build still progressing at end of pass");
        Ok(outcomes)
    }

    /// Dependency builds whose identity matches the attempt's correlation label
    pub async fn builds_for_attempt(
        &self,
        attempt: &BuildAttempt,
    ) -> Result<Vec<ObjectKey>, ReconcileError> {
        let Some(identity) = attempt.metadata.labels.get(DEPENDENCY_BUILD_ID_LABEL) else {
            return Ok(Vec::new());
        };

        let selector = LabelSelector::everything().with_label(DEPENDENCY_BUILD_ID_LABEL, identity);
        let builds: Vec<DependencyBuild> = self
            .store
            .list(&attempt.metadata.namespace, &selector)
            .await?;
        Ok(builds.iter().map(Resource::key).collect())
    }

    /// One level-triggered pass over the namespace
    ///
    /// A failing record is logged and counted; it never aborts the pass.
    pub async fn run_once(&self) -> Result<PassSummary, ReconcileError> {
        let namespace = &self.config.namespace;
        let builds: Vec<DependencyBuild> = self
            .store
            .list(namespace, &LabelSelector::everything())
            .await?;

        let mut summary = PassSummary {
            builds: builds.len(),
            ..Default::default()
        };

        for db in &builds {
            let key = db.key();
            match self.settle(&key).await {
                Ok(outcomes) => {
                    summary.evaluations += outcomes.len();
                    summary.transitions += outcomes
                        .iter()
                        .filter(|o| matches!(o, ReconcileOutcome::Transitioned { .. }))
                        .count();
                }
                Err(e) if e.is_transient() => {
                    summary.errors += 1;
                    warn!(build = %key, error = %e, "Reconcile interrupted, will retry next pass");
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(build = %key, error = %e, "Reconcile failed");
                }
            }
        }

        let timeout = self.config.reconcile_timeout();
        match tokio::time::timeout(timeout, self.artifacts.rebuild(namespace)).await {
            Ok(Ok(outcome)) => {
                summary.filter_written = matches!(outcome, FilterOutcome::Written { .. });
            }
            Ok(Err(e)) => {
                summary.errors += 1;
                error!(error = %e, "Failed to rebuild membership filter");
            }
            Err(_) => {
                summary.errors += 1;
                warn!(seconds = timeout.as_secs(), "Membership filter rebuild timed out");
            }
        }

        debug!(
            builds = summary.builds,
            evaluations = summary.evaluations,
            transitions = summary.transitions,
            errors = summary.errors,
            "Controller pass complete"
        );
        Ok(summary)
    }

    /// Repeat passes until `shutdown` resolves
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            namespace = %self.config.namespace,
            interval_secs = self.config.poll_interval_secs,
            "Controller started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping controller");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Controller pass failed");
                    }
                }
            }
        }
    }

    /// Repeat passes until Ctrl-C
    pub async fn run(&self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;
    }
}
