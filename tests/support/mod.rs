use async_trait::async_trait;
use jvm_rebuild::events::RecordingHandler;
use jvm_rebuild::model::{
    BuildAttempt, DependencyBuild, LabelSelector, ObjectKey, Resource, ScmInfo,
};
use jvm_rebuild::recipe::BuilderImage;
use jvm_rebuild::store::{MemoryStore, Store, StoreError};
use jvm_rebuild::{Controller, ServiceConfig};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[allow(dead_code)]
pub const NAMESPACE: &str = "builds";

#[allow(dead_code)]
pub fn jvm_rebuild_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_jvm-rebuild"))
}

#[allow(dead_code)]
pub fn images(names: &[&str]) -> Vec<BuilderImage> {
    names
        .iter()
        .map(|name| BuilderImage::new(*name, format!("registry/{}:1", name)))
        .collect()
}

/// In-memory store whose first dependency build update after each attempt
/// submission loses an optimistic-concurrency race
#[derive(Default)]
#[allow(dead_code)]
pub struct ConflictingStore {
    inner: MemoryStore,
    armed: AtomicBool,
    conflicts: AtomicUsize,
}

#[allow(dead_code)]
impl ConflictingStore {
    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for ConflictingStore {
    async fn get_raw(&self, kind: &str, key: &ObjectKey) -> Result<Value, StoreError> {
        self.inner.get_raw(kind, key).await
    }

    async fn list_raw(
        &self,
        kind: &str,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Value>, StoreError> {
        self.inner.list_raw(kind, namespace, selector).await
    }

    async fn create_raw(&self, kind: &str, object: Value) -> Result<Value, StoreError> {
        let created = self.inner.create_raw(kind, object).await?;
        if kind == BuildAttempt::KIND {
            self.armed.store(true, Ordering::SeqCst);
        }
        Ok(created)
    }

    async fn update_raw(&self, kind: &str, object: Value) -> Result<Value, StoreError> {
        if kind == DependencyBuild::KIND && self.armed.swap(false, Ordering::SeqCst) {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
            let version = object
                .pointer("/metadata/resourceVersion")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            return Err(StoreError::Conflict {
                kind: kind.to_string(),
                name: object
                    .pointer("/metadata/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                expected: version,
                found: version + 1,
            });
        }
        self.inner.update_raw(kind, object).await
    }
}

/// Controller over an in-memory store with a recording event handler
#[allow(dead_code)]
pub struct Harness {
    pub store: Arc<dyn Store>,
    pub events: Arc<RecordingHandler>,
    pub controller: Controller,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(builders: &[&str]) -> Self {
        Self::with_store(builders, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(builders: &[&str], store: Arc<dyn Store>) -> Self {
        let config = ServiceConfig {
            namespace: NAMESPACE.to_string(),
            reconcile_timeout_secs: 30,
            poll_interval_secs: 1,
            filter_name: "jvm-build-service-filter".to_string(),
            store_path: std::env::temp_dir().join("jvm-rebuild-unused.json"),
            builder_images: images(builders),
            log_level: "info".to_string(),
        };
        let events = Arc::new(RecordingHandler::new());
        let controller = Controller::new(Arc::new(config), store.clone(), events.clone());

        Self {
            store,
            events,
            controller,
        }
    }

    pub async fn submit(&self, name: &str, url: &str, tag: &str) -> ObjectKey {
        let db = DependencyBuild::new(NAMESPACE, name, ScmInfo::new(url, tag, ""));
        self.store.create(&db).await.unwrap();
        ObjectKey::new(NAMESPACE, name)
    }

    pub async fn build(&self, key: &ObjectKey) -> DependencyBuild {
        self.store.get(key).await.unwrap()
    }

    /// Attempts in submission order
    pub async fn attempts(&self) -> Vec<BuildAttempt> {
        let mut attempts: Vec<BuildAttempt> = self
            .store
            .list(NAMESPACE, &LabelSelector::everything())
            .await
            .unwrap();
        attempts.sort_by(|a, b| {
            a.metadata
                .creation_timestamp
                .cmp(&b.metadata.creation_timestamp)
        });
        attempts
    }

    /// Finish the newest attempt the way the pipeline engine would, then settle its builds
    pub async fn finish_latest(&self, succeeded: bool, contaminants: Option<&str>) -> BuildAttempt {
        let mut attempt = self.attempts().await.pop().unwrap();
        attempt.complete(succeeded, contaminants);
        self.store.update(&attempt).await.unwrap();

        for key in self.controller.builds_for_attempt(&attempt).await.unwrap() {
            self.controller.settle(&key).await.unwrap();
        }
        attempt
    }
}
