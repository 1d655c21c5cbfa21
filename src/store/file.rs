//! File-backed store: the memory store persisted as a JSON snapshot

use super::memory::{MemoryStore, Snapshot};
use super::{Store, StoreError};
use crate::model::{LabelSelector, ObjectKey};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Store persisting every mutation to a single JSON file
///
/// Writes go to a sibling temp file which is then renamed over the snapshot,
/// so a crash never leaves a truncated file behind.
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the snapshot at `path`, starting empty if it does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let inner = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => MemoryStore::new(),
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                debug!(
                    path = %path.display(),
                    objects = snapshot.objects.len(),
                    "Loaded store snapshot"
                );
                MemoryStore::from_snapshot(snapshot)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            inner,
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self, kind: &str) -> usize {
        self.inner.count(kind)
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.inner.snapshot()?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get_raw(&self, kind: &str, key: &ObjectKey) -> Result<Value, StoreError> {
        self.inner.get_sync(kind, key)
    }

    async fn list_raw(
        &self,
        kind: &str,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Value>, StoreError> {
        self.inner.list_sync(kind, namespace, selector)
    }

    async fn create_raw(&self, kind: &str, object: Value) -> Result<Value, StoreError> {
        let created = self.inner.create_sync(kind, object)?;
        self.persist().await?;
        Ok(created)
    }

    async fn update_raw(&self, kind: &str, object: Value) -> Result<Value, StoreError> {
        let updated = self.inner.update_sync(kind, object)?;
        self.persist().await?;
        Ok(updated)
    }
}
