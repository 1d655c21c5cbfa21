//! Resource store abstraction
//!
//! The cluster resource store is an external collaborator: generic
//! create/get/update/list of structured records with optimistic concurrency.
//! [`Store`] is the object-safe seam, working on JSON documents partitioned by
//! kind; the typed helpers on `dyn Store` convert to and from [`Resource`]s.
//!
//! Implementations:
//! - [`MemoryStore`]: in-process map, used by tests and as the engine of
//! - [`FileStore`]: the memory store persisted to a JSON snapshot file

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::model::{LabelSelector, ObjectKey, Resource};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by resource store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The update was based on a stale resource version
    #[error("Conflict updating {kind} {name}: expected version {expected}, found {found}")]
    Conflict {
        kind: String,
        name: String,
        expected: u64,
        found: u64,
    },

    /// The record was rejected at admission
    #[error("Invalid {kind}: {reason}")]
    Invalid { kind: String, reason: String },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Kind-erased record storage
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_raw(&self, kind: &str, key: &ObjectKey) -> Result<Value, StoreError>;

    async fn list_raw(
        &self,
        kind: &str,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Value>, StoreError>;

    /// Persist a new record; assigns name (from `generateName`), version and timestamp
    async fn create_raw(&self, kind: &str, object: Value) -> Result<Value, StoreError>;

    /// Replace an existing record if its `resourceVersion` is current
    async fn update_raw(&self, kind: &str, object: Value) -> Result<Value, StoreError>;
}

impl<'a> dyn Store + 'a {
    pub async fn get<R: Resource>(&self, key: &ObjectKey) -> Result<R, StoreError> {
        let raw = self.get_raw(R::KIND, key).await?;
        Ok(serde_json::from_value(raw)?)
    }

    pub async fn list<R: Resource>(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<R>, StoreError> {
        self.list_raw(R::KIND, namespace, selector)
            .await?
            .into_iter()
            .map(|raw| serde_json::from_value(raw).map_err(StoreError::from))
            .collect()
    }

    pub async fn create<R: Resource>(&self, resource: &R) -> Result<R, StoreError> {
        let raw = self.create_raw(R::KIND, serde_json::to_value(resource)?).await?;
        Ok(serde_json::from_value(raw)?)
    }

    pub async fn update<R: Resource>(&self, resource: &R) -> Result<R, StoreError> {
        let raw = self.update_raw(R::KIND, serde_json::to_value(resource)?).await?;
        Ok(serde_json::from_value(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        let not_found = StoreError::NotFound {
            kind: "DependencyBuild".to_string(),
            namespace: "ns".to_string(),
            name: "x".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());
        assert_eq!(not_found.to_string(), "DependencyBuild ns/x not found");

        let conflict = StoreError::Conflict {
            kind: "DependencyBuild".to_string(),
            name: "x".to_string(),
            expected: 1,
            found: 2,
        };
        assert!(conflict.is_conflict());
    }
}
