// ── Wire records ──
//
// Objects exactly as the ioBroker object database stores them:
// `{ "_id", "type", "common": {..}, "native": {..}, ..meta }`.
// Typing of `common` happens in `iodev-core`; this layer never drops fields.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single object record as delivered by the backing store.
///
/// Uses `#[serde(flatten)]` for everything beyond the core set (`acl`,
/// `from`, `ts`, ...), so round-tripping a record is lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    /// Dotted object id, e.g. `"alias.0.kitchen.light.SET"`.
    #[serde(rename = "_id")]
    pub id: String,

    /// Object type: `"folder"`, `"channel"`, `"device"`, `"state"`, `"enum"`, ...
    #[serde(rename = "type")]
    pub object_type: String,

    #[serde(default)]
    pub common: Map<String, Value>,

    #[serde(default)]
    pub native: Map<String, Value>,

    /// All remaining top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawObject {
    /// Build a record from its id, type and `common` bag.
    ///
    /// Non-object `common` values are treated as empty.
    pub fn new(id: impl Into<String>, object_type: impl Into<String>, common: Value) -> Self {
        let common = match common {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            object_type: object_type.into(),
            common,
            native: Map::new(),
            extra: Map::new(),
        }
    }

    /// Attach a `native` bag.
    #[must_use]
    pub fn with_native(mut self, native: Value) -> Self {
        if let Value::Object(map) = native {
            self.native = map;
        }
        self
    }

    /// Parse a record from its JSON form.
    pub fn from_json(value: Value) -> Result<Self, crate::Error> {
        let id = value
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_owned();
        serde_json::from_value(value).map_err(|e| crate::Error::Malformed {
            id,
            message: e.to_string(),
        })
    }
}

/// A change notification: the object was created/updated (`Some`) or
/// deleted (`None`).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEvent {
    pub id: String,
    pub object: Option<Arc<RawObject>>,
}

impl ObjectEvent {
    pub fn updated(object: RawObject) -> Self {
        Self {
            id: object.id.clone(),
            object: Some(Arc::new(object)),
        }
    }

    pub fn deleted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: None,
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.object.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_object_round_trips_unknown_fields() {
        let value = json!({
            "_id": "alias.0.kitchen.light",
            "type": "channel",
            "common": { "name": "Light", "role": "light" },
            "native": {},
            "acl": { "owner": "system.user.admin" },
            "from": "system.adapter.admin.0"
        });
        let raw = RawObject::from_json(value.clone()).unwrap();
        assert_eq!(raw.object_type, "channel");
        assert!(raw.extra.contains_key("acl"));
        assert_eq!(serde_json::to_value(&raw).unwrap(), value);
    }

    #[test]
    fn from_json_reports_id_of_malformed_record() {
        let err = RawObject::from_json(json!({ "_id": "x.0.y", "common": {} })).unwrap_err();
        assert_eq!(err.object_id(), Some("x.0.y"));
    }

    #[test]
    fn non_object_common_is_empty() {
        let raw = RawObject::new("a.0.b", "folder", json!("oops"));
        assert!(raw.common.is_empty());
    }
}
