// Shared fixtures for iodev-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iodev_api::{Error, MemoryStore, ObjectStore, ObjectSubscription, RawObject};
use iodev_core::ViewState;
use serde_json::json;
use tokio::sync::watch;

// ── Raw object builders ──────────────────────────────────────────────

pub fn folder(id: &str, name: &str) -> RawObject {
    RawObject::new(id, "folder", json!({ "name": name }))
}

pub fn channel(id: &str, name: &str) -> RawObject {
    RawObject::new(id, "channel", json!({ "name": name }))
}

pub fn state(id: &str, role: &str, value_type: &str) -> RawObject {
    let name = id.rsplit('.').next().unwrap_or(id);
    RawObject::new(
        id,
        "state",
        json!({ "name": name, "role": role, "type": value_type, "read": true, "write": true }),
    )
}

pub fn enum_object(id: &str, members: &[&str]) -> RawObject {
    RawObject::new(id, "enum", json!({ "name": id, "members": members }))
}

/// Kitchen light: a channel with a role-less boolean `SET` state.
pub fn kitchen_light() -> Vec<RawObject> {
    vec![
        channel("alias.0.kitchen.light", "Ceiling light"),
        RawObject::new(
            "alias.0.kitchen.light.SET",
            "state",
            json!({ "name": "SET", "type": "boolean", "read": true, "write": true }),
        ),
    ]
}

/// A small home: kitchen light, a living-room folder and room enums.
pub fn home() -> Vec<RawObject> {
    let mut objects = kitchen_light();
    objects.extend([
        folder("alias.0.kitchen", "Kitchen"),
        folder("alias.0.living", "Living room"),
        enum_object("enum.rooms.kitchen", &["alias.0.kitchen.light"]),
        enum_object("enum.rooms.living", &[]),
        enum_object("enum.functions.light", &["alias.0.kitchen.light"]),
    ]);
    objects
}

// ── View helpers ─────────────────────────────────────────────────────

/// Wait until a published view satisfies `pred`.
pub async fn wait_for(
    rx: &mut watch::Receiver<Arc<ViewState>>,
    pred: impl Fn(&ViewState) -> bool,
) -> Arc<ViewState> {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let view = Arc::clone(&rx.borrow_and_update());
            if pred(&view) {
                return view;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("view never reached the expected state")
}

pub fn device_index(view: &ViewState, channel_id: &str) -> usize {
    view.device_index_of(channel_id)
        .unwrap_or_else(|| panic!("no device {channel_id} in {:?}", view.devices))
}

pub fn members(store: &MemoryStore, enum_id: &str) -> Vec<String> {
    let object = store.get(enum_id).unwrap();
    serde_json::from_value(object.common["members"].clone()).unwrap()
}

// ── Slow store ───────────────────────────────────────────────────────

/// `MemoryStore` whose writes take `delay`, so mutations overlap.
pub struct SlowStore {
    pub inner: Arc<MemoryStore>,
    pub delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl ObjectStore for SlowStore {
    async fn get_object(&self, id: &str) -> Result<Option<RawObject>, Error> {
        self.inner.get_object(id).await
    }

    async fn get_objects(&self) -> Result<HashMap<String, RawObject>, Error> {
        self.inner.get_objects().await
    }

    async fn set_object(&self, id: &str, object: RawObject) -> Result<(), Error> {
        tokio::time::sleep(self.delay).await;
        self.inner.set_object(id, object).await
    }

    async fn del_object(&self, id: &str) -> Result<(), Error> {
        tokio::time::sleep(self.delay).await;
        self.inner.del_object(id).await
    }

    async fn del_objects(&self, id: &str) -> Result<(), Error> {
        self.inner.del_objects(id).await
    }

    async fn get_enums(&self) -> Result<HashMap<String, RawObject>, Error> {
        self.inner.get_enums().await
    }

    async fn adapter_instances(&self, adapter: &str) -> Result<Vec<RawObject>, Error> {
        self.inner.adapter_instances(adapter).await
    }

    fn subscribe(&self, pattern: &str) -> Result<ObjectSubscription, Error> {
        self.inner.subscribe(pattern)
    }
}
