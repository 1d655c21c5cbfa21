//! Level-triggered reconcilers
//!
//! Each reconciler re-derives its decision from the persisted records on every
//! call and writes back at most one status change, so evaluating the same key
//! repeatedly is always safe.

pub mod bloom;
mod contamination;
mod dependency_build;
mod rebuilt_artifact;

pub use bloom::BloomFilter;
pub use contamination::{ContaminationResolver, LinkOutcome};
pub use dependency_build::DependencyBuildReconciler;
pub use rebuilt_artifact::{FilterOutcome, RebuiltArtifactReconciler};

use crate::model::{DependencyBuildState, ObjectKey};
use crate::store::StoreError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Reconcile timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl ReconcileError {
    /// Conflicts and timeouts resolve themselves on the next trigger
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcileError::Store(e) => e.is_conflict(),
            ReconcileError::Timeout { .. } => true,
        }
    }
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record no longer exists
    Missing,
    /// Nothing to do until something external changes
    NoOp,
    Transitioned {
        from: DependencyBuildState,
        to: DependencyBuildState,
    },
    /// The record was written without a state change
    Updated,
}

impl ReconcileOutcome {
    pub(crate) fn between(from: DependencyBuildState, to: DependencyBuildState) -> Self {
        if from == to {
            ReconcileOutcome::Updated
        } else {
            ReconcileOutcome::Transitioned { from, to }
        }
    }

    /// Whether another evaluation may make further progress
    pub fn made_progress(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Transitioned { .. } | ReconcileOutcome::Updated
        )
    }
}

#[async_trait]
pub trait Reconciler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcileError>;
}

/// Run one evaluation bounded by `timeout`
///
/// A timed-out evaluation is dropped at its next await point; store writes
/// already issued stay, later ones never happen.
pub async fn reconcile_with_timeout(
    reconciler: &dyn Reconciler,
    key: &ObjectKey,
    timeout: Duration,
) -> Result<ReconcileOutcome, ReconcileError> {
    match tokio::time::timeout(timeout, reconciler.reconcile(key)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                reconciler = reconciler.name(),
                key = %key,
                seconds = timeout.as_secs(),
                "Evaluation timed out"
            );
            Err(ReconcileError::Timeout {
                seconds: timeout.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowReconciler;

    #[async_trait]
    impl Reconciler for SlowReconciler {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn reconcile(&self, _key: &ObjectKey) -> Result<ReconcileOutcome, ReconcileError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ReconcileOutcome::NoOp)
        }
    }

    #[tokio::test]
    async fn test_timeout_aborts_evaluation() {
        let key = ObjectKey::new("ns", "db");
        let result = reconcile_with_timeout(&SlowReconciler, &key, Duration::from_millis(20)).await;

        assert!(matches!(result, Err(ReconcileError::Timeout { .. })));
    }

    #[test]
    fn test_outcome_progress() {
        assert!(ReconcileOutcome::between(DependencyBuildState::New, DependencyBuildState::Detect)
            .made_progress());
        assert_eq!(
            ReconcileOutcome::between(DependencyBuildState::Building, DependencyBuildState::Building),
            ReconcileOutcome::Updated
        );
        assert!(!ReconcileOutcome::NoOp.made_progress());
        assert!(!ReconcileOutcome::Missing.made_progress());
    }

    #[test]
    fn test_transient_errors() {
        let conflict = ReconcileError::from(StoreError::Conflict {
            kind: "DependencyBuild".to_string(),
            name: "db".to_string(),
            expected: 1,
            found: 2,
        });
        assert!(conflict.is_transient());
        assert!(ReconcileError::Timeout { seconds: 1 }.is_transient());
        assert!(!ReconcileError::from(StoreError::Poisoned).is_transient());
    }
}
