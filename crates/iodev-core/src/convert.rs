// ── Wire-to-domain conversions ──
//
// Bridges `iodev_api::RawObject` records and typed `ManagedObject`s.
// Kind-specific keys are lifted out of `common` into the `ObjectKind`
// variant; everything else stays in `Common::extra`, so a round trip
// reproduces the record.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use iodev_api::RawObject;

use crate::error::CoreError;
use crate::model::{Common, EnumCommon, ManagedObject, ObjectKind, StateCommon};

// ── Helpers ──────────────────────────────────────────────────────────

fn malformed(id: &str, err: &serde_json::Error) -> CoreError {
    CoreError::MalformedObject {
        id: id.to_owned(),
        message: err.to_string(),
    }
}

/// Move `keys` out of `common` and deserialize them as `T`.
fn take_typed<T: DeserializeOwned>(
    id: &str,
    common: &mut Map<String, Value>,
    keys: &[&str],
) -> Result<T, CoreError> {
    let mut taken = Map::new();
    for key in keys {
        if let Some(value) = common.remove(*key) {
            taken.insert((*key).to_owned(), value);
        }
    }
    serde_json::from_value(Value::Object(taken)).map_err(|e| malformed(id, &e))
}

/// Serialize `value` and merge its keys into `common`.
fn merge_into<T: Serialize>(common: &mut Map<String, Value>, value: &T) {
    if let Ok(Value::Object(fields)) = serde_json::to_value(value) {
        common.extend(fields);
    }
}

// ── RawObject → ManagedObject ────────────────────────────────────────

impl TryFrom<RawObject> for ManagedObject {
    type Error = CoreError;

    fn try_from(raw: RawObject) -> Result<Self, CoreError> {
        let RawObject {
            id,
            object_type,
            mut common,
            native,
            extra,
        } = raw;

        let kind = match ObjectKind::from_type_name(&object_type) {
            ObjectKind::State(_) => {
                ObjectKind::State(take_typed(&id, &mut common, &StateCommon::KEYS)?)
            }
            ObjectKind::Enum(_) => {
                let parsed: EnumCommon = take_typed(&id, &mut common, &EnumCommon::KEYS)?;
                ObjectKind::Enum(EnumCommon::new(parsed.members))
            }
            other => other,
        };

        let common: Common =
            serde_json::from_value(Value::Object(common)).map_err(|e| malformed(&id, &e))?;

        Ok(ManagedObject {
            id,
            common,
            kind,
            native,
            meta: extra,
        })
    }
}

// ── ManagedObject → RawObject ────────────────────────────────────────

impl From<&ManagedObject> for RawObject {
    fn from(object: &ManagedObject) -> Self {
        let mut common = Map::new();
        merge_into(&mut common, &object.common);
        match &object.kind {
            ObjectKind::State(state) => merge_into(&mut common, state),
            ObjectKind::Enum(members) => merge_into(&mut common, members),
            ObjectKind::Folder | ObjectKind::Channel | ObjectKind::Device | ObjectKind::Other(_) => {}
        }
        RawObject {
            id: object.id.clone(),
            object_type: object.kind.type_name().to_owned(),
            common,
            native: object.native.clone(),
            extra: object.meta.clone(),
        }
    }
}

impl From<ManagedObject> for RawObject {
    fn from(object: ManagedObject) -> Self {
        Self::from(&object)
    }
}

/// Convert a bulk read, skipping (and logging) records that do not parse.
pub fn convert_all(raw: HashMap<String, RawObject>) -> HashMap<String, ManagedObject> {
    raw.into_iter()
        .filter_map(|(id, record)| match ManagedObject::try_from(record) {
            Ok(object) => Some((id, object)),
            Err(e) => {
                warn!(id = %id, error = %e, "skipping malformed object");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::AliasTarget;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn state_fields_are_lifted_into_kind() {
        let raw = RawObject::new(
            "alias.0.kitchen.light.SET",
            "state",
            json!({
                "name": { "en": "Switch", "de": "Schalter" },
                "role": "switch.light",
                "type": "boolean",
                "read": true,
                "write": true,
                "def": false,
                "alias": { "id": "hm-rpc.0.ABC.1.STATE" }
            }),
        );
        let obj = ManagedObject::try_from(raw).unwrap();
        let state = obj.state().unwrap();
        assert_eq!(state.value_type.as_deref(), Some("boolean"));
        assert_eq!(
            state.alias.as_ref().unwrap().id,
            AliasTarget::Single("hm-rpc.0.ABC.1.STATE".into())
        );
        assert_eq!(obj.common.extra.get("def"), Some(&json!(false)));
        assert!(!obj.common.extra.contains_key("type"));
    }

    #[test]
    fn conversion_is_lossless() {
        let value = json!({
            "_id": "alias.0.kitchen.light.SET",
            "type": "state",
            "common": {
                "name": "Switch",
                "role": "switch.light",
                "type": "boolean",
                "min": 0,
                "smartName": { "en": "Kitchen" },
                "custom": { "history.0": { "enabled": true } },
                "desc": "free text"
            },
            "native": { "address": 4 },
            "acl": { "owner": "system.user.admin" }
        });
        let raw = RawObject::from_json(value.clone()).unwrap();
        let obj = ManagedObject::try_from(raw).unwrap();
        let back = RawObject::from(&obj);
        assert_eq!(serde_json::to_value(&back).unwrap(), value);
    }

    #[test]
    fn enum_members_are_normalized() {
        let raw = RawObject::new("enum.rooms.kitchen", "enum", json!({ "members": ["b", "a", "b"] }));
        let obj = ManagedObject::try_from(raw).unwrap();
        assert_eq!(obj.enum_common().unwrap().members, ["a", "b"]);
    }

    #[test]
    fn malformed_records_are_skipped_in_bulk() {
        let mut raw = HashMap::new();
        raw.insert(
            "enum.rooms.bad".to_owned(),
            RawObject::new("enum.rooms.bad", "enum", json!({ "members": 7 })),
        );
        raw.insert(
            "alias.0.ok".to_owned(),
            RawObject::new("alias.0.ok", "folder", json!({ "name": "ok" })),
        );
        let converted = convert_all(raw);
        assert_eq!(converted.len(), 1);
        assert!(converted.contains_key("alias.0.ok"));
    }
}
