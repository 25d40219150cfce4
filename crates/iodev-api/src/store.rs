// ── Object store contract ──
//
// The async operations `iodev-core` performs against the ioBroker object
// database, plus the pattern-filtered change stream.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::Error;
use crate::object::{ObjectEvent, RawObject};

/// Abstract key-value object store with change notifications.
///
/// Implementations do not serialize writes from multiple clients; a
/// concurrent change surfaces as a later [`ObjectEvent`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read a single object. `Ok(None)` if it does not exist.
    async fn get_object(&self, id: &str) -> Result<Option<RawObject>, Error>;

    /// Bulk read of the whole namespace.
    async fn get_objects(&self) -> Result<HashMap<String, RawObject>, Error>;

    /// Create or replace an object.
    async fn set_object(&self, id: &str, object: RawObject) -> Result<(), Error>;

    /// Delete a single object.
    async fn del_object(&self, id: &str) -> Result<(), Error>;

    /// Delete an object and everything below it.
    async fn del_objects(&self, id: &str) -> Result<(), Error>;

    /// All `enum.*` grouping objects.
    async fn get_enums(&self) -> Result<HashMap<String, RawObject>, Error>;

    /// Instance objects (`system.adapter.<name>.<n>`) of an adapter.
    async fn adapter_instances(&self, adapter: &str) -> Result<Vec<RawObject>, Error>;

    /// Subscribe to changes of objects whose id matches `pattern`.
    ///
    /// Dropping the returned subscription unsubscribes.
    fn subscribe(&self, pattern: &str) -> Result<ObjectSubscription, Error>;
}

/// One item delivered by an [`ObjectSubscription`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionItem {
    Event(ObjectEvent),
    /// The consumer fell behind and `n` events were dropped. The local
    /// cache must be reloaded from the store.
    Lagged(u64),
}

/// Pattern-filtered view of a store's broadcast change stream.
pub struct ObjectSubscription {
    pattern: String,
    rx: broadcast::Receiver<ObjectEvent>,
}

impl ObjectSubscription {
    pub fn new(pattern: impl Into<String>, rx: broadcast::Receiver<ObjectEvent>) -> Self {
        Self {
            pattern: pattern.into(),
            rx,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Wait for the next matching event.
    ///
    /// Returns `None` once the store side has been dropped.
    pub async fn recv(&mut self) -> Option<SubscriptionItem> {
        loop {
            match self.rx.recv().await {
                Ok(event) if pattern_matches(&self.pattern, &event.id) => {
                    return Some(SubscriptionItem::Event(event));
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, pattern = %self.pattern, "object subscription lagged");
                    return Some(SubscriptionItem::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// ioBroker-style id pattern: `*` matches any run of characters
/// (including dots), everything else matches literally.
pub fn pattern_matches(pattern: &str, id: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return id.is_empty();
    };
    let Some(mut rest) = id.strip_prefix(first) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // No `*` at all: exact match.
        return rest.is_empty();
    };
    for piece in middle {
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::pattern_matches;

    #[test]
    fn star_matches_everything() {
        assert!(pattern_matches("*", "alias.0.a.b"));
        assert!(pattern_matches("*", ""));
    }

    #[test]
    fn trailing_star_is_prefix_match() {
        assert!(pattern_matches("alias.0.*", "alias.0.kitchen.light"));
        assert!(!pattern_matches("alias.0.*", "alias.1.kitchen"));
        assert!(!pattern_matches("alias.0.*", "alias.0"));
    }

    #[test]
    fn literal_pattern_is_exact() {
        assert!(pattern_matches("enum.rooms.kitchen", "enum.rooms.kitchen"));
        assert!(!pattern_matches("enum.rooms.kitchen", "enum.rooms.kitchen2"));
    }

    #[test]
    fn inner_star_matches_middle() {
        assert!(pattern_matches("system.adapter.*.0", "system.adapter.admin.0"));
        assert!(!pattern_matches("system.adapter.*.0", "system.adapter.admin.1"));
        assert!(pattern_matches("a*b*c", "axxbyyc"));
        assert!(!pattern_matches("a*bc*c", "abc"));
    }
}
