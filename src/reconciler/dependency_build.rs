//! Dependency build state machine
//!
//! ```text
//! New -> Detect -> Building -> Complete
//!                     |  ^  \-> Contaminated -> (contaminants cleared) -> New
//!                     |  |
//!                     +--+ failed attempt, next recipe
//!                     \-> Failed (recipes exhausted)
//! ```
//!
//! Every recipe is tried at most once per identity. Editing the source
//! coordinates changes the identity and starts the campaign over.

use super::contamination::ContaminationResolver;
use super::{ReconcileError, ReconcileOutcome, Reconciler};
use crate::events::{EventHandler, ReconcileEvent};
use crate::model::{BuildAttempt, DependencyBuild, DependencyBuildState, ObjectKey, Resource};
use crate::recipe::RecipeCatalog;
use crate::store::{Store, StoreError};
use crate::tracker::{self, AttemptStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DependencyBuildReconciler {
    store: Arc<dyn Store>,
    catalog: Arc<RecipeCatalog>,
    resolver: ContaminationResolver,
    events: Arc<dyn EventHandler>,
}

impl DependencyBuildReconciler {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<RecipeCatalog>,
        events: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            resolver: ContaminationResolver::new(store.clone(), events.clone()),
            store,
            catalog,
            events,
        }
    }

    /// Persist `db` and report the move away from `from`
    async fn commit(
        &self,
        db: &DependencyBuild,
        from: DependencyBuildState,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.store.update(db).await?;
        let to = db.status.state;
        if from != to {
            self.events.on_event(&ReconcileEvent::StateChanged {
                build: db.key(),
                from,
                to,
            });
        }
        Ok(ReconcileOutcome::between(from, to))
    }

    async fn handle_new(
        &self,
        mut db: DependencyBuild,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let failed = &db.status.failed_build_recipes;
        let potential: Vec<_> = self
            .catalog
            .propose()
            .into_iter()
            .filter(|recipe| !failed.contains(recipe))
            .collect();

        debug!(build = %db.key(), recipes = potential.len(), "Proposed build recipes");
        db.status.potential_build_recipes = potential;
        db.status.state = DependencyBuildState::Detect;
        self.commit(&db, DependencyBuildState::New).await
    }

    /// Abandon the current recipe and submit the next one, or fail when none is left
    ///
    /// The attempt is created before the status is written: a rejected
    /// submission leaves the record untouched apart from the recipe bookkeeping.
    async fn attempt_next_recipe(
        &self,
        mut db: DependencyBuild,
        from: DependencyBuildState,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let identity = db.computed_identity();

        loop {
            if let Some(current) = db.status.current_build_recipe.take() {
                if !db.status.failed_build_recipes.contains(&current) {
                    db.status.failed_build_recipes.push(current);
                }
            }

            if db.status.potential_build_recipes.is_empty() {
                info!(
                    build = %db.key(),
                    failed = db.status.failed_build_recipes.len(),
                    "All build recipes failed"
                );
                db.status.state = DependencyBuildState::Failed;
                return self.commit(&db, from).await;
            }

            let recipe = db.status.potential_build_recipes.remove(0);
            db.status.current_build_recipe = Some(recipe.clone());

            if !recipe.is_submittable() {
                warn!(build = %db.key(), recipe = %recipe, "Recipe has no builder image, skipping");
                continue;
            }

            let attempt = BuildAttempt::for_dependency_build(&db, &identity, &recipe);
            let created = match self.store.create(&attempt).await {
                Ok(created) => created,
                Err(StoreError::Invalid { reason, .. }) => {
                    warn!(build = %db.key(), recipe = %recipe, reason = %reason, "Build attempt rejected");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            self.events.on_event(&ReconcileEvent::AttemptSubmitted {
                build: db.key(),
                attempt: created.metadata.name.clone(),
                recipe: recipe.to_string(),
            });
            db.status.state = DependencyBuildState::Building;
            return self.commit(&db, from).await;
        }
    }

    async fn handle_building(
        &self,
        mut db: DependencyBuild,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let identity = db.computed_identity();
        let attempts =
            tracker::list_attempts(self.store.as_ref(), &db.metadata.namespace, &identity).await?;

        let Some(latest) = tracker::latest_attempt(&attempts) else {
            self.events
                .on_event(&ReconcileEvent::NoPipelineRun { build: db.key() });
            db.status.current_build_recipe = None;
            db.status.state = DependencyBuildState::New;
            return self.commit(&db, DependencyBuildState::Building).await;
        };

        if adopt_unrecorded_attempt(&mut db, latest) {
            info!(build = %db.key(), attempt = %latest.metadata.name, "Recorded build attempt missing from status");
            return self.commit(&db, DependencyBuildState::Building).await;
        }

        let outcome = match tracker::classify(latest, db.status.last_completed_build_attempt.as_deref()) {
            AttemptStatus::AlreadyConsumed | AttemptStatus::Running => {
                debug!(build = %db.key(), attempt = %latest.metadata.name, "Waiting for build attempt");
                return Ok(ReconcileOutcome::NoOp);
            }
            AttemptStatus::Finished(outcome) => outcome,
        };

        self.events.on_event(&ReconcileEvent::AttemptCompleted {
            build: db.key(),
            attempt: outcome.attempt.clone(),
            succeeded: outcome.succeeded,
            contaminants: outcome.contaminants.len(),
        });
        let clean = outcome.is_clean();
        db.status.last_completed_build_attempt = Some(outcome.attempt);
        db.status.contaminants = outcome.contaminants;

        if !outcome.succeeded {
            return self
                .attempt_next_recipe(db, DependencyBuildState::Building)
                .await;
        }

        db.status.state = if clean {
            DependencyBuildState::Complete
        } else {
            DependencyBuildState::Contaminated
        };
        self.commit(&db, DependencyBuildState::Building).await
    }

    /// Submit the first recipe unless a submission already went out
    async fn handle_detect(
        &self,
        mut db: DependencyBuild,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let identity = db.computed_identity();
        let attempts =
            tracker::list_attempts(self.store.as_ref(), &db.metadata.namespace, &identity).await?;

        if let Some(latest) = tracker::latest_attempt(&attempts) {
            if adopt_unrecorded_attempt(&mut db, latest) {
                info!(build = %db.key(), attempt = %latest.metadata.name, "Recorded build attempt missing from status");
                db.status.state = DependencyBuildState::Building;
                return self.commit(&db, DependencyBuildState::Detect).await;
            }
        }

        self.attempt_next_recipe(db, DependencyBuildState::Detect)
            .await
    }

    async fn handle_contaminated(
        &self,
        mut db: DependencyBuild,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if db.status.contaminants.is_empty() {
            db.status.current_build_recipe = None;
            db.status.state = DependencyBuildState::New;
            return self.commit(&db, DependencyBuildState::Contaminated).await;
        }

        let written = self.resolver.resolve(&db).await?;
        debug!(build = %db.key(), written, "Resolved contaminants");
        Ok(ReconcileOutcome::NoOp)
    }
}

/// Bring the status in line with an attempt whose submission was never recorded
///
/// A status update that loses a conflict after the attempt was created leaves
/// the attempt running while its recipe is still listed as pending. The
/// previous recipe and any recipes skipped before the submitted one move to
/// failed, exactly as the lost update would have recorded them. Returns
/// whether the status changed.
fn adopt_unrecorded_attempt(db: &mut DependencyBuild, latest: &BuildAttempt) -> bool {
    let status = &mut db.status;
    if status.last_completed_build_attempt.as_deref() == Some(latest.metadata.name.as_str()) {
        return false;
    }
    let Some(image) = latest.image() else {
        return false;
    };
    if status
        .current_build_recipe
        .as_ref()
        .is_some_and(|recipe| recipe.image == image)
    {
        return false;
    }
    let Some(index) = status
        .potential_build_recipes
        .iter()
        .position(|recipe| recipe.image == image)
    else {
        return false;
    };

    let abandoned: Vec<_> = status
        .current_build_recipe
        .take()
        .into_iter()
        .chain(status.potential_build_recipes.drain(..index))
        .collect();
    for recipe in abandoned {
        if !status.failed_build_recipes.contains(&recipe) {
            status.failed_build_recipes.push(recipe);
        }
    }
    status.current_build_recipe = Some(status.potential_build_recipes.remove(0));
    true
}

#[async_trait]
impl Reconciler for DependencyBuildReconciler {
    fn name(&self) -> &'static str {
        "dependencybuild"
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcileError> {
        let mut db: DependencyBuild = match self.store.get(key).await {
            Ok(db) => db,
            Err(e) if e.is_not_found() => return Ok(ReconcileOutcome::Missing),
            Err(e) => return Err(e.into()),
        };

        let identity = db.computed_identity();
        if db.identity() != Some(identity.as_str()) {
            let previous = db.identity().map(str::to_string);
            let from = db.status.state;
            db.reset_identity(identity.clone());
            self.events.on_event(&ReconcileEvent::IdentityChanged {
                build: db.key(),
                previous,
                identity,
            });
            return self.commit(&db, from).await;
        }

        debug!(build = %key, state = %db.status.state, "Reconciling dependency build");
        match db.status.state {
            DependencyBuildState::New => self.handle_new(db).await,
            DependencyBuildState::Detect => self.handle_detect(db).await,
            DependencyBuildState::Building => self.handle_building(db).await,
            DependencyBuildState::Complete | DependencyBuildState::Failed => {
                Ok(ReconcileOutcome::NoOp)
            }
            DependencyBuildState::Contaminated => self.handle_contaminated(db).await,
        }
    }
}
