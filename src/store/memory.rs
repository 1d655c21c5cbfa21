use super::{Store, StoreError};
use crate::model::{LabelSelector, ObjectKey, ObjectMeta};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

const GENERATED_SUFFIX_LEN: usize = 5;

type StoreKey = (String, String, String);

/// Serializable content of a [`MemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub objects: Vec<StoredObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub kind: String,
    pub object: Value,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<StoreKey, Value>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Creation timestamps are strictly increasing so "latest" is always well defined
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}

/// In-memory resource store with optimistic concurrency
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        let mut objects = BTreeMap::new();
        for stored in snapshot.objects {
            let meta = read_meta(&stored.kind, &stored.object)?;
            objects.insert(
                (stored.kind, meta.namespace, meta.name),
                stored.object,
            );
        }
        Ok(Self {
            state: RwLock::new(State {
                objects,
                last_timestamp: snapshot.last_timestamp,
            }),
        })
    }

    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let state = self.read()?;
        Ok(Snapshot {
            objects: state
                .objects
                .iter()
                .map(|((kind, _, _), object)| StoredObject {
                    kind: kind.clone(),
                    object: object.clone(),
                })
                .collect(),
            last_timestamp: state.last_timestamp,
        })
    }

    /// Number of stored records of `kind`
    pub fn count(&self, kind: &str) -> usize {
        self.read()
            .map(|s| s.objects.keys().filter(|(k, _, _)| k == kind).count())
            .unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }

    pub(super) fn get_sync(&self, kind: &str, key: &ObjectKey) -> Result<Value, StoreError> {
        let state = self.read()?;
        state
            .objects
            .get(&store_key(kind, &key.namespace, &key.name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: kind.to_string(),
                namespace: key.namespace.clone(),
                name: key.name.clone(),
            })
    }

    pub(super) fn list_sync(
        &self,
        kind: &str,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Value>, StoreError> {
        let state = self.read()?;
        let mut items = Vec::new();
        for ((k, ns, _), object) in state.objects.iter() {
            if k != kind || (!namespace.is_empty() && ns != namespace) {
                continue;
            }
            let meta = read_meta(kind, object)?;
            if selector.matches(&meta.labels) {
                items.push(object.clone());
            }
        }
        Ok(items)
    }

    pub(super) fn create_sync(&self, kind: &str, mut object: Value) -> Result<Value, StoreError> {
        let mut meta = read_meta(kind, &object)?;
        if meta.namespace.is_empty() {
            return Err(invalid(kind, "metadata.namespace is required"));
        }

        let mut state = self.write()?;
        if meta.name.is_empty() {
            if meta.generate_name.is_empty() {
                return Err(invalid(kind, "metadata.name or metadata.generateName is required"));
            }
            meta.name = loop {
                let suffix = Uuid::new_v4().simple().to_string();
                let candidate = format!("{}{}", meta.generate_name, &suffix[..GENERATED_SUFFIX_LEN]);
                if !state
                    .objects
                    .contains_key(&store_key(kind, &meta.namespace, &candidate))
                {
                    break candidate;
                }
            };
        } else if state
            .objects
            .contains_key(&store_key(kind, &meta.namespace, &meta.name))
        {
            return Err(StoreError::AlreadyExists {
                kind: kind.to_string(),
                namespace: meta.namespace,
                name: meta.name,
            });
        }

        meta.resource_version = 1;
        meta.creation_timestamp = Some(state.next_timestamp());
        write_meta(kind, &mut object, &meta)?;
        state.objects.insert(
            store_key(kind, &meta.namespace, &meta.name),
            object.clone(),
        );
        Ok(object)
    }

    pub(super) fn update_sync(&self, kind: &str, mut object: Value) -> Result<Value, StoreError> {
        let mut meta = read_meta(kind, &object)?;
        let key = store_key(kind, &meta.namespace, &meta.name);

        let mut state = self.write()?;
        let existing = state.objects.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: kind.to_string(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
        })?;
        let current = read_meta(kind, existing)?;
        if current.resource_version != meta.resource_version {
            return Err(StoreError::Conflict {
                kind: kind.to_string(),
                name: meta.name,
                expected: meta.resource_version,
                found: current.resource_version,
            });
        }

        meta.resource_version += 1;
        meta.creation_timestamp = current.creation_timestamp;
        write_meta(kind, &mut object, &meta)?;
        state.objects.insert(key, object.clone());
        Ok(object)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_raw(&self, kind: &str, key: &ObjectKey) -> Result<Value, StoreError> {
        self.get_sync(kind, key)
    }

    async fn list_raw(
        &self,
        kind: &str,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Value>, StoreError> {
        self.list_sync(kind, namespace, selector)
    }

    async fn create_raw(&self, kind: &str, object: Value) -> Result<Value, StoreError> {
        self.create_sync(kind, object)
    }

    async fn update_raw(&self, kind: &str, object: Value) -> Result<Value, StoreError> {
        self.update_sync(kind, object)
    }
}

fn store_key(kind: &str, namespace: &str, name: &str) -> StoreKey {
    (kind.to_string(), namespace.to_string(), name.to_string())
}

fn invalid(kind: &str, reason: &str) -> StoreError {
    StoreError::Invalid {
        kind: kind.to_string(),
        reason: reason.to_string(),
    }
}

fn read_meta(kind: &str, object: &Value) -> Result<ObjectMeta, StoreError> {
    let raw = object
        .get("metadata")
        .ok_or_else(|| invalid(kind, "metadata is required"))?;
    Ok(serde_json::from_value(raw.clone())?)
}

fn write_meta(kind: &str, object: &mut Value, meta: &ObjectMeta) -> Result<(), StoreError> {
    let map = object
        .as_object_mut()
        .ok_or_else(|| invalid(kind, "record must be a JSON object"))?;
    map.insert("metadata".to_string(), serde_json::to_value(meta)?);
    Ok(())
}
