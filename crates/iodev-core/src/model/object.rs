// ── Managed object domain types ──
//
// Typed view of a stored object. Shared presentation fields live in
// `Common`; fields that only make sense for states or enums live in the
// matching `ObjectKind` variant. Unknown keys survive in `extra` maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Display name: plain text or a per-language map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Name {
    Text(String),
    Localized(BTreeMap<String, String>),
}

impl Default for Name {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Name {
    /// Resolve for `lang`, falling back to English, then to any entry.
    pub fn resolve(&self, lang: &str) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Localized(map) => map
                .get(lang)
                .or_else(|| map.get("en"))
                .or_else(|| map.values().next())
                .map_or("", String::as_str),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Localized(map) => map.values().all(String::is_empty),
        }
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Name {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Fields shared by every object type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Common {
    #[serde(default)]
    pub name: Name,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Raw smart-name value; see [`crate::smart_name`] for the typed view.
    #[serde(rename = "smartName", default, skip_serializing_if = "Option::is_none")]
    pub smart_name: Option<Value>,

    /// Per-integration settings, keyed by instance id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Common {
    pub fn named(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Target of an alias state: one id, or separate read/write ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasTarget {
    Single(String),
    Split { read: String, write: String },
}

impl AliasTarget {
    pub fn read_id(&self) -> &str {
        match self {
            Self::Single(id) | Self::Split { read: id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasLink {
    pub id: AliasTarget,

    /// Conversion functions (`read`, `write`) and anything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AliasLink {
    pub fn to(id: impl Into<String>) -> Self {
        Self {
            id: AliasTarget::Single(id.into()),
            extra: Map::new(),
        }
    }
}

/// State-only `common` fields. All optional, so absent keys stay absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateCommon {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Value labels: a map or the legacy `"0:off;1:on"` string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<AliasLink>,
}

impl StateCommon {
    /// Keys of `common` that belong to this struct.
    pub const KEYS: [&'static str; 8] =
        ["type", "read", "write", "min", "max", "unit", "states", "alias"];
}

/// Enum-only `common` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumCommon {
    /// Member ids, deduplicated and sorted.
    #[serde(default)]
    pub members: Vec<String>,
}

impl EnumCommon {
    pub const KEYS: [&'static str; 1] = ["members"];

    pub fn new(members: impl IntoIterator<Item = String>) -> Self {
        let mut members: Vec<String> = members.into_iter().collect();
        members.sort_unstable();
        members.dedup();
        Self { members }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.binary_search_by(|m| m.as_str().cmp(id)).is_ok()
    }

    /// Returns `true` if the member was added.
    pub fn insert(&mut self, id: &str) -> bool {
        match self.members.binary_search_by(|m| m.as_str().cmp(id)) {
            Ok(_) => false,
            Err(pos) => {
                self.members.insert(pos, id.to_owned());
                true
            }
        }
    }

    /// Remove every id in `ids`; returns `true` if anything was removed.
    pub fn remove_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        let before = self.members.len();
        let doomed: Vec<&str> = ids.into_iter().collect();
        self.members.retain(|m| !doomed.contains(&m.as_str()));
        self.members.len() != before
    }
}

/// Object type with its variant-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Folder,
    Channel,
    Device,
    State(StateCommon),
    Enum(EnumCommon),
    /// `instance`, `adapter`, `meta`, ...
    Other(String),
}

impl ObjectKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "folder" => Self::Folder,
            "channel" => Self::Channel,
            "device" => Self::Device,
            "state" => Self::State(StateCommon::default()),
            "enum" => Self::Enum(EnumCommon::default()),
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Folder => "folder",
            Self::Channel => "channel",
            Self::Device => "device",
            Self::State(_) => "state",
            Self::Enum(_) => "enum",
            Self::Other(name) => name,
        }
    }

    /// Folder, channel or device.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Folder | Self::Channel | Self::Device)
    }
}

/// A stored object, typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedObject {
    pub id: String,
    pub common: Common,
    pub kind: ObjectKind,
    /// Opaque adapter data, preserved verbatim.
    pub native: Map<String, Value>,
    /// Top-level bookkeeping (`acl`, `from`, `ts`, ...).
    pub meta: Map<String, Value>,
}

impl ManagedObject {
    pub fn new(id: impl Into<String>, kind: ObjectKind, common: Common) -> Self {
        Self {
            id: id.into(),
            common,
            kind,
            native: Map::new(),
            meta: Map::new(),
        }
    }

    pub fn folder(id: impl Into<String>, name: impl Into<Name>) -> Self {
        Self::new(id, ObjectKind::Folder, Common::named(name))
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ObjectKind::Folder)
    }

    pub fn state(&self) -> Option<&StateCommon> {
        match &self.kind {
            ObjectKind::State(state) => Some(state),
            _ => None,
        }
    }

    pub fn state_mut(&mut self) -> Option<&mut StateCommon> {
        match &mut self.kind {
            ObjectKind::State(state) => Some(state),
            _ => None,
        }
    }

    pub fn enum_common(&self) -> Option<&EnumCommon> {
        match &self.kind {
            ObjectKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn enum_common_mut(&mut self) -> Option<&mut EnumCommon> {
        match &mut self.kind {
            ObjectKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<&str> {
        self.common.role.as_deref()
    }

    /// Copy this object under a new id. Bookkeeping fields are dropped,
    /// so the store stamps fresh ones.
    pub fn duplicate_as(&self, new_id: impl Into<String>) -> Self {
        Self {
            id: new_id.into(),
            common: self.common.clone(),
            kind: self.kind.clone(),
            native: self.native.clone(),
            meta: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_resolution_falls_back() {
        let name = Name::Localized(BTreeMap::from([
            ("de".to_owned(), "Küche".to_owned()),
            ("en".to_owned(), "Kitchen".to_owned()),
        ]));
        assert_eq!(name.resolve("de"), "Küche");
        assert_eq!(name.resolve("fr"), "Kitchen");
        assert_eq!(Name::from("x").resolve("de"), "x");
    }

    #[test]
    fn enum_members_stay_sorted_and_unique() {
        let mut e = EnumCommon::new(["b".to_owned(), "a".to_owned(), "b".to_owned()]);
        assert_eq!(e.members, ["a", "b"]);
        assert!(e.insert("ab"));
        assert!(!e.insert("a"));
        assert_eq!(e.members, ["a", "ab", "b"]);
        assert!(e.remove_all(["a", "zz"]));
        assert_eq!(e.members, ["ab", "b"]);
        assert!(!e.remove_all(["zz"]));
    }

    #[test]
    fn duplicate_drops_meta() {
        let mut obj = ManagedObject::folder("alias.0.a", "A");
        obj.meta.insert("ts".into(), Value::from(1));
        obj.native.insert("k".into(), Value::from("v"));
        let copy = obj.duplicate_as("alias.0.b");
        assert_eq!(copy.id, "alias.0.b");
        assert!(copy.meta.is_empty());
        assert_eq!(copy.native, obj.native);
    }
}
