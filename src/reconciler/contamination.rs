//! Contamination resolver
//!
//! Turns the contaminant list of a finished dependency build into artifact
//! build requests, one per coordinate, each carrying a back-reference
//! annotation to every build it contaminated.

use crate::events::{EventHandler, ReconcileEvent};
use crate::identity::{artifact_build_request_name, contaminated_by_key, contaminated_by_key_full};
use crate::model::{ArtifactBuildRequest, DependencyBuild, ObjectKey, Resource};
use crate::store::{Store, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to the rebuild request of one contaminant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Annotated,
    /// The request already referenced this build
    Unchanged,
}

pub struct ContaminationResolver {
    store: Arc<dyn Store>,
    events: Arc<dyn EventHandler>,
}

impl ContaminationResolver {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventHandler>) -> Self {
        Self { store, events }
    }

    /// Create or annotate a rebuild request for every contaminant of `db`
    ///
    /// Returns the number of requests written.
    pub async fn resolve(&self, db: &DependencyBuild) -> Result<usize, StoreError> {
        let mut seen = HashSet::new();
        let mut written = 0;

        for gav in db.status.contaminants.iter().map(|c| c.trim()) {
            if gav.is_empty() || !seen.insert(gav) {
                continue;
            }
            if self.link(db, gav).await? != LinkOutcome::Unchanged {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Make sure the rebuild request for `gav` references `db`
    pub async fn link(&self, db: &DependencyBuild, gav: &str) -> Result<LinkOutcome, StoreError> {
        let key = ObjectKey::new(
            db.metadata.namespace.clone(),
            artifact_build_request_name(gav),
        );

        let outcome = match self.store.get::<ArtifactBuildRequest>(&key).await {
            Ok(existing) => self.annotate(existing, db).await?,
            Err(e) if e.is_not_found() => {
                let mut request =
                    ArtifactBuildRequest::new(key.namespace.clone(), key.name.clone(), gav);
                request.metadata.annotations.insert(
                    contaminated_by_key(&db.metadata.name),
                    db.metadata.name.clone(),
                );
                match self.store.create(&request).await {
                    Ok(_) => LinkOutcome::Created,
                    Err(StoreError::AlreadyExists { .. }) => {
                        // created concurrently by another build
                        let existing = self.store.get::<ArtifactBuildRequest>(&key).await?;
                        self.annotate(existing, db).await?
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        debug!(gav, request = %key, ?outcome, "Resolved contaminant");
        if outcome != LinkOutcome::Unchanged {
            self.events.on_event(&ReconcileEvent::ContaminantLinked {
                build: db.key(),
                gav: gav.to_string(),
                request: key.name,
                created: outcome == LinkOutcome::Created,
            });
        }
        Ok(outcome)
    }

    async fn annotate(
        &self,
        mut request: ArtifactBuildRequest,
        db: &DependencyBuild,
    ) -> Result<LinkOutcome, StoreError> {
        let name = &db.metadata.name;
        let Some(key) = annotation_key(&request, name) else {
            return Ok(LinkOutcome::Unchanged);
        };

        request.metadata.annotations.insert(key, name.clone());
        self.store.update(&request).await?;
        Ok(LinkOutcome::Annotated)
    }
}

/// Annotation key to write for `build`, or `None` when it is already recorded
///
/// A short key held by a different build falls back to the full-digest key so
/// the other back-reference is never overwritten.
fn annotation_key(request: &ArtifactBuildRequest, build: &str) -> Option<String> {
    let annotations = &request.metadata.annotations;
    let short = contaminated_by_key(build);

    match annotations.get(&short) {
        None => Some(short),
        Some(existing) if existing == build => None,
        Some(existing) => {
            let full = contaminated_by_key_full(build);
            if annotations.get(&full).map(String::as_str) == Some(build) {
                return None;
            }
            warn!(
                request = %request.metadata.name,
                key = %short,
                holder = %existing,
                build,
                "Annotation key collision, using full digest key"
            );
            Some(full)
        }
    }
}
