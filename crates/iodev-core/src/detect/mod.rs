// ── Device detection ──
//
// `Detector` is the seam to the classifier; `DetectorAdapter` fronts it
// with a per-generation cache of the sorted key index, the dominant cost
// when scanning a large namespace.

mod catalog;
mod pattern;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwapOption;
use tracing::debug;

use crate::model::DeviceMatch;
use crate::store::NamespaceSnapshot;

pub use catalog::{DevicePattern, RoleRule, StatePattern, pattern_catalog, pattern_for};
pub use pattern::PatternDetector;

/// Input for one detection call.
#[derive(Debug, Clone, Copy)]
pub struct DetectRequest<'a> {
    /// Candidate device root.
    pub root_id: &'a str,
    pub snapshot: &'a NamespaceSnapshot,
    /// Every key of `snapshot`, in byte order.
    pub sorted_keys: &'a [String],
}

/// Classifies the objects under a root into typed devices.
pub trait Detector: Send + Sync {
    /// `None` when `root_id` is not a plausible device root; otherwise
    /// zero or more matches. Slots without an object carry `id: None`.
    fn detect(&self, request: &DetectRequest<'_>) -> Option<Vec<DeviceMatch>>;

    /// Static description of the known device types.
    fn pattern_catalog(&self) -> &'static [DevicePattern];
}

/// Per-call knobs for [`DetectorAdapter::detect`].
#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    /// Sorted keys of the snapshot, if the caller already has them.
    pub sorted_keys_hint: Option<Arc<[String]>>,
    /// Ignore the cached index and sort again.
    pub force_rebuild_index: bool,
}

struct KeyIndex {
    generation: u64,
    keys: Arc<[String]>,
}

/// Detector front-end with a cached key index.
pub struct DetectorAdapter {
    detector: Arc<dyn Detector>,
    index: ArcSwapOption<KeyIndex>,
    rebuilds: AtomicUsize,
}

impl DetectorAdapter {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector,
            index: ArcSwapOption::empty(),
            rebuilds: AtomicUsize::new(0),
        }
    }

    /// Adapter over the built-in [`PatternDetector`].
    pub fn builtin() -> Self {
        Self::new(Arc::new(PatternDetector::new()))
    }

    pub fn detect(
        &self,
        root_id: &str,
        snapshot: &NamespaceSnapshot,
        options: &DetectOptions,
    ) -> Option<Vec<DeviceMatch>> {
        let keys = match &options.sorted_keys_hint {
            Some(hint) => Arc::clone(hint),
            None => self.index_for(snapshot, options.force_rebuild_index),
        };
        self.detector.detect(&DetectRequest {
            root_id,
            snapshot,
            sorted_keys: &keys,
        })
    }

    /// Sorted keys of `snapshot`, from cache when the generation matches.
    pub fn sorted_keys(&self, snapshot: &NamespaceSnapshot) -> Arc<[String]> {
        self.index_for(snapshot, false)
    }

    pub fn pattern_catalog(&self) -> &'static [DevicePattern] {
        self.detector.pattern_catalog()
    }

    /// How often the key index was rebuilt.
    pub fn index_rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::Relaxed)
    }

    fn index_for(&self, snapshot: &NamespaceSnapshot, force: bool) -> Arc<[String]> {
        if !force {
            if let Some(index) = self.index.load_full() {
                if index.generation == snapshot.generation() {
                    return Arc::clone(&index.keys);
                }
            }
        }
        let keys: Arc<[String]> = snapshot.sorted_keys().into();
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        debug!(
            generation = snapshot.generation(),
            keys = keys.len(),
            "rebuilt detector key index"
        );
        self.index.store(Some(Arc::new(KeyIndex {
            generation: snapshot.generation(),
            keys: Arc::clone(&keys),
        })));
        keys
    }
}

impl std::fmt::Debug for DetectorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorAdapter")
            .field("rebuilds", &self.index_rebuilds())
            .finish_non_exhaustive()
    }
}
