// ── Object cache ──
//
// Read-through cache owned by the reconciler task. Copy-on-write: a
// mutation while a snapshot is still held clones the map of `Arc`s, never
// the objects themselves.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::ManagedObject;

use super::snapshot::{NamespaceSnapshot, ObjectMap};

#[derive(Debug, Default)]
pub struct ObjectCache {
    objects: Arc<ObjectMap>,
    /// Last snapshot handed out; `None` once the cache changed since.
    published: Option<NamespaceSnapshot>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole content, e.g. after a bulk reload.
    pub fn replace_all(&mut self, objects: HashMap<String, ManagedObject>) {
        self.objects = Arc::new(
            objects
                .into_iter()
                .map(|(id, o)| (id, Arc::new(o)))
                .collect(),
        );
        self.published = None;
    }

    pub fn upsert(&mut self, object: ManagedObject) {
        Arc::make_mut(&mut self.objects).insert(object.id.clone(), Arc::new(object));
        self.published = None;
    }

    /// Returns `true` if the id was cached.
    pub fn remove(&mut self, id: &str) -> bool {
        if !self.objects.contains_key(id) {
            return false;
        }
        Arc::make_mut(&mut self.objects).remove(id);
        self.published = None;
        true
    }

    pub fn get(&self, id: &str) -> Option<&ManagedObject> {
        self.objects.get(id).map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Snapshot of the current content. Unchanged content keeps its
    /// generation.
    pub fn snapshot(&mut self) -> NamespaceSnapshot {
        if let Some(snapshot) = &self.published {
            return snapshot.clone();
        }
        let snapshot = NamespaceSnapshot::from_shared(Arc::clone(&self.objects));
        self.published = Some(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_generation_tracks_changes() {
        let mut cache = ObjectCache::new();
        cache.upsert(ManagedObject::folder("alias.0.a", "A"));
        let first = cache.snapshot();
        assert_eq!(cache.snapshot().generation(), first.generation());

        cache.upsert(ManagedObject::folder("alias.0.b", "B"));
        let second = cache.snapshot();
        assert_ne!(second.generation(), first.generation());

        // The older snapshot is unaffected by the write.
        assert!(!first.contains("alias.0.b"));
        assert!(second.contains("alias.0.b"));
    }

    #[test]
    fn removing_unknown_id_keeps_generation() {
        let mut cache = ObjectCache::new();
        cache.upsert(ManagedObject::folder("alias.0.a", "A"));
        let gen_before = cache.snapshot().generation();
        assert!(!cache.remove("alias.0.zzz"));
        assert_eq!(cache.snapshot().generation(), gen_before);
        assert!(cache.remove("alias.0.a"));
        assert!(cache.is_empty());
    }
}
