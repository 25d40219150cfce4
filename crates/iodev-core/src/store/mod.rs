// ── Object cache and snapshots ──
//
// The reconciler owns an `ObjectCache`; everything downstream works on
// immutable `NamespaceSnapshot`s taken from it.

mod cache;
mod snapshot;

pub use cache::ObjectCache;
pub use snapshot::NamespaceSnapshot;
