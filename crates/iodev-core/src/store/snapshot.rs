// ── Namespace snapshot ──
//
// Immutable view of the object namespace handed to detection, enrichment
// and tree synthesis. Cloning is cheap; the generation identifies the
// content, so derived indexes can be cached per generation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::ManagedObject;
use crate::namespace;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

pub(crate) type ObjectMap = HashMap<String, Arc<ManagedObject>>;

/// Point-in-time view of all cached objects.
#[derive(Debug, Clone)]
pub struct NamespaceSnapshot {
    objects: Arc<ObjectMap>,
    generation: u64,
}

impl NamespaceSnapshot {
    /// Build a snapshot from owned objects, keyed by their ids.
    pub fn from_objects(objects: impl IntoIterator<Item = ManagedObject>) -> Self {
        let map = objects
            .into_iter()
            .map(|o| (o.id.clone(), Arc::new(o)))
            .collect();
        Self::from_shared(Arc::new(map))
    }

    pub fn empty() -> Self {
        Self::from_shared(Arc::new(HashMap::new()))
    }

    pub(crate) fn from_shared(objects: Arc<ObjectMap>) -> Self {
        Self {
            objects,
            generation: next_generation(),
        }
    }

    /// Identifies this content; two snapshots with equal generations
    /// hold the same objects.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: &str) -> Option<&ManagedObject> {
        self.objects.get(id).map(AsRef::as_ref)
    }

    pub fn get_shared(&self, id: &str) -> Option<Arc<ManagedObject>> {
        self.objects.get(id).cloned()
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

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManagedObject)> {
        self.objects.iter().map(|(id, o)| (id.as_str(), o.as_ref()))
    }

    /// All ids in byte order. Prefer the detector's cached index.
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// `true` if `id` names an existing folder, channel or device.
    pub fn is_container(&self, id: &str) -> bool {
        self.get(id).is_some_and(ManagedObject::is_container)
    }

    /// Objects strictly below `prefix`, in no particular order.
    pub fn descendants<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a ManagedObject> {
        self.objects
            .iter()
            .filter(move |(id, _)| namespace::is_below(id, prefix))
            .map(|(_, o)| o.as_ref())
    }

    /// Enum objects whose id starts with `prefix` (`enum.rooms.`).
    pub fn enums_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a ManagedObject> {
        self.objects
            .iter()
            .filter(move |(id, o)| id.starts_with(prefix) && o.enum_common().is_some())
            .map(|(_, o)| o.as_ref())
    }
}

impl Default for NamespaceSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
