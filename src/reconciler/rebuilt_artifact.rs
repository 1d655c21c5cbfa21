//! Membership index over rebuilt artifacts
//!
//! Any change to the rebuilt artifact collection rebuilds the whole filter and
//! writes it to a single well-known blob in the namespace of the change.

use super::bloom::{BloomFilter, FILTER_KEY};
use super::{ReconcileError, ReconcileOutcome, Reconciler};
use crate::events::{EventHandler, ReconcileEvent};
use crate::model::{BinaryBlob, LabelSelector, ObjectKey, RebuiltArtifact};
use crate::store::{Store, StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one filter rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// There are no rebuilt artifacts, so there is no filter to serve
    Skipped,
    /// The persisted filter already had these bytes
    Unchanged { items: usize, bytes: usize },
    Written { items: usize, bytes: usize, created: bool },
}

pub struct RebuiltArtifactReconciler {
    store: Arc<dyn Store>,
    filter_name: String,
    events: Arc<dyn EventHandler>,
}

impl RebuiltArtifactReconciler {
    pub fn new(
        store: Arc<dyn Store>,
        filter_name: impl Into<String>,
        events: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            store,
            filter_name: filter_name.into(),
            events,
        }
    }

    fn blob_key(&self, namespace: &str) -> ObjectKey {
        ObjectKey::new(namespace, self.filter_name.clone())
    }

    /// Recompute the filter from every known rebuilt artifact and store it in `namespace`
    pub async fn rebuild(&self, namespace: &str) -> Result<FilterOutcome, StoreError> {
        let artifacts: Vec<RebuiltArtifact> =
            self.store.list("", &LabelSelector::everything()).await?;
        if artifacts.is_empty() {
            debug!("No rebuilt artifacts, skipping filter");
            return Ok(FilterOutcome::Skipped);
        }

        let filter = BloomFilter::build(artifacts.iter().map(|a| a.spec.gav.as_str()));
        let items = artifacts.len();
        let bytes = filter.len();
        info!(items, filter_length = bytes, "Constructed bloom filter");

        let key = self.blob_key(namespace);
        let created = match self.store.get::<BinaryBlob>(&key).await {
            Ok(mut blob) => {
                if blob.binary_data.get(FILTER_KEY).map(Vec::as_slice) == Some(filter.as_bytes()) {
                    return Ok(FilterOutcome::Unchanged { items, bytes });
                }
                blob.binary_data
                    .insert(FILTER_KEY.to_string(), filter.into_bytes());
                self.store.update(&blob).await?;
                false
            }
            Err(e) if e.is_not_found() => {
                let mut blob = BinaryBlob::new(key.namespace.clone(), key.name.clone());
                blob.binary_data
                    .insert(FILTER_KEY.to_string(), filter.into_bytes());
                self.store.create(&blob).await?;
                true
            }
            Err(e) => return Err(e),
        };

        self.events.on_event(&ReconcileEvent::FilterRebuilt {
            blob: key,
            items,
            bytes,
        });
        Ok(FilterOutcome::Written {
            items,
            bytes,
            created,
        })
    }

    /// Persisted filter of `namespace`, if one has been written
    pub async fn load(&self, namespace: &str) -> Result<Option<BloomFilter>, StoreError> {
        match self.store.get::<BinaryBlob>(&self.blob_key(namespace)).await {
            Ok(mut blob) => Ok(blob
                .binary_data
                .remove(FILTER_KEY)
                .map(BloomFilter::from_bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Test `gav` against the persisted filter; `None` when there is no filter
    pub async fn contains(&self, namespace: &str, gav: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.load(namespace).await?.map(|filter| filter.contains(gav)))
    }
}

#[async_trait]
impl Reconciler for RebuiltArtifactReconciler {
    fn name(&self) -> &'static str {
        "rebuiltartifact"
    }

    /// `key` names the rebuilt artifact that changed; it may already be deleted
    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcileError> {
        match self.rebuild(&key.namespace).await? {
            FilterOutcome::Written { .. } => Ok(ReconcileOutcome::Updated),
            FilterOutcome::Skipped | FilterOutcome::Unchanged { .. } => Ok(ReconcileOutcome::NoOp),
        }
    }
}
