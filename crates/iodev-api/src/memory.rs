// ── In-memory object store ──
//
// DashMap-backed implementation of `ObjectStore`. Every mutation is
// broadcast to subscribers, in the order it was applied. Individual ids
// can be marked as failing to exercise partial-failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Error;
use crate::object::{ObjectEvent, RawObject};
use crate::store::{ObjectStore, ObjectSubscription};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Object store held entirely in process memory.
pub struct MemoryStore {
    objects: DashMap<String, Arc<RawObject>>,
    events: broadcast::Sender<ObjectEvent>,
    /// Ids whose writes and deletes are rejected.
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            objects: DashMap::new(),
            events,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Seed a store without emitting change events.
    pub fn with_objects(objects: impl IntoIterator<Item = RawObject>) -> Self {
        let store = Self::new();
        for object in objects {
            store.objects.insert(object.id.clone(), Arc::new(object));
        }
        store
    }

    /// Reject every subsequent write or delete of `id`.
    pub fn fail_writes_to(&self, id: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into());
    }

    pub fn clear_failures(&self) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Synchronous read, for assertions.
    pub fn get(&self, id: &str) -> Option<Arc<RawObject>> {
        self.objects.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.objects.iter().map(|r| r.key().clone()).collect();
        ids.sort_unstable();
        ids
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn check_writable(&self, id: &str) -> Result<(), Error> {
        let failing = self.failing.lock().unwrap_or_else(PoisonError::into_inner);
        if failing.contains(id) {
            return Err(Error::Rejected {
                id: id.to_owned(),
                reason: "write rejected by store".into(),
            });
        }
        Ok(())
    }

    fn remove(&self, id: &str) {
        if self.objects.remove(id).is_some() {
            // `send` only fails when nobody listens.
            let _ = self.events.send(ObjectEvent::deleted(id));
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, id: &str) -> Result<Option<RawObject>, Error> {
        Ok(self.objects.get(id).map(|r| RawObject::clone(r.value())))
    }

    async fn get_objects(&self) -> Result<HashMap<String, RawObject>, Error> {
        Ok(self
            .objects
            .iter()
            .map(|r| (r.key().clone(), RawObject::clone(r.value())))
            .collect())
    }

    async fn set_object(&self, id: &str, mut object: RawObject) -> Result<(), Error> {
        self.check_writable(id)?;
        if object.id != id {
            object.id = id.to_owned();
        }
        debug!(id, "set_object");
        let object = Arc::new(object);
        self.objects.insert(id.to_owned(), Arc::clone(&object));
        let _ = self.events.send(ObjectEvent {
            id: id.to_owned(),
            object: Some(object),
        });
        Ok(())
    }

    async fn del_object(&self, id: &str) -> Result<(), Error> {
        self.check_writable(id)?;
        debug!(id, "del_object");
        self.remove(id);
        Ok(())
    }

    async fn del_objects(&self, id: &str) -> Result<(), Error> {
        let prefix = format!("{id}.");
        let mut doomed: Vec<String> = self
            .objects
            .iter()
            .filter(|r| r.key() == id || r.key().starts_with(&prefix))
            .map(|r| r.key().clone())
            .collect();
        // Children first, so a listener never sees an orphaned child.
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for doomed_id in &doomed {
            self.check_writable(doomed_id)?;
        }
        debug!(id, count = doomed.len(), "del_objects");
        for doomed_id in &doomed {
            self.remove(doomed_id);
        }
        Ok(())
    }

    async fn get_enums(&self) -> Result<HashMap<String, RawObject>, Error> {
        Ok(self
            .objects
            .iter()
            .filter(|r| r.key().starts_with("enum.") && r.value().object_type == "enum")
            .map(|r| (r.key().clone(), RawObject::clone(r.value())))
            .collect())
    }

    async fn adapter_instances(&self, adapter: &str) -> Result<Vec<RawObject>, Error> {
        let prefix = format!("system.adapter.{adapter}.");
        let mut instances: Vec<RawObject> = self
            .objects
            .iter()
            .filter(|r| {
                r.value().object_type == "instance"
                    && r.key()
                        .strip_prefix(&prefix)
                        .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
            })
            .map(|r| RawObject::clone(r.value()))
            .collect();
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(instances)
    }

    fn subscribe(&self, pattern: &str) -> Result<ObjectSubscription, Error> {
        Ok(ObjectSubscription::new(pattern, self.events.subscribe()))
    }
}
