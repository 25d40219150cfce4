// ── Enum membership ──
//
// Rooms and functions are `enum.*` objects listing member ids. There is
// no back-pointer on the device: membership is found by searching the
// enums, and changed by rewriting them one at a time.

use iodev_api::{ObjectStore, RawObject};
use strum::{Display, EnumIter};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DeviceMatch, ManagedObject, MembershipChange, StepFailure, StepKind};
use crate::namespace;
use crate::store::NamespaceSnapshot;

/// Grouping category, selected by id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum EnumCategory {
    Rooms,
    Functions,
}

impl EnumCategory {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Rooms => "enum.rooms.",
            Self::Functions => "enum.functions.",
        }
    }

    pub fn of(enum_id: &str) -> Option<Self> {
        if enum_id.starts_with(Self::Rooms.prefix()) {
            Some(Self::Rooms)
        } else if enum_id.starts_with(Self::Functions.prefix()) {
            Some(Self::Functions)
        } else {
            None
        }
    }

    pub fn contains(self, enum_id: &str) -> bool {
        enum_id.starts_with(self.prefix())
    }
}

/// The id standing in for `device` in enum member lists.
///
/// The first required state with an id, rolled up to its parent container
/// (channel, device or folder) when the device spans several states inside
/// an editable namespace.
pub fn representative_id(
    device: &DeviceMatch,
    snapshot: &NamespaceSnapshot,
    editable_namespaces: &[&str],
) -> Result<String, CoreError> {
    let Some(id) = device.main_state_id() else {
        return Err(CoreError::DetectorInvariant {
            kind: device.kind.to_string(),
        });
    };

    let editable = editable_namespaces
        .iter()
        .any(|ns| namespace::is_within(id, ns));
    if device.states.len() == 1 || !editable {
        return Ok(id.to_owned());
    }

    let parent = namespace::parent_id(id);
    let rolls_up = snapshot.get(parent).is_some_and(ManagedObject::is_container);
    Ok(if rolls_up { parent } else { id }.to_owned())
}

/// The subset of `enum_ids` listing `id` as a member.
pub fn memberships_of<'a>(
    id: &str,
    enum_ids: impl IntoIterator<Item = &'a str>,
    snapshot: &NamespaceSnapshot,
) -> Vec<String> {
    enum_ids
        .into_iter()
        .filter(|enum_id| {
            snapshot
                .get(enum_id)
                .and_then(ManagedObject::enum_common)
                .is_some_and(|e| e.contains(id))
        })
        .map(str::to_owned)
        .collect()
}

/// All enum ids of `category` in `snapshot`, sorted.
pub fn enum_ids(snapshot: &NamespaceSnapshot, category: EnumCategory) -> Vec<String> {
    let mut ids: Vec<String> = snapshot
        .enums_under(category.prefix())
        .map(|e| e.id.clone())
        .collect();
    ids.sort_unstable();
    ids
}

/// Make `id` a member of exactly the `desired` enums of `category`.
///
/// Only enums among `all_enum_ids` under the category prefix are touched,
/// each with its own read-modify-write. A failing enum is reported and
/// the rest continue.
pub async fn set_membership(
    store: &dyn ObjectStore,
    id: &str,
    desired: &[String],
    all_enum_ids: &[String],
    category: EnumCategory,
) -> MembershipChange {
    let mut outcome = MembershipChange::default();

    for enum_id in all_enum_ids.iter().filter(|e| category.contains(e)) {
        let wanted = desired.contains(enum_id);
        let step = if wanted {
            StepKind::AddMembership
        } else {
            StepKind::RemoveMembership
        };
        let result = if wanted {
            add_member(store, enum_id, id).await
        } else {
            remove_members(store, enum_id, &[id]).await
        };
        match result {
            Ok(changed) => outcome.changed |= changed,
            Err(e) => {
                warn!(enum_id = %enum_id, id, error = %e, "membership update failed");
                outcome.failures.push(StepFailure {
                    id: enum_id.clone(),
                    step,
                    message: e.to_string(),
                });
            }
        }
    }
    outcome
}

/// Add `id` to one enum. Returns `true` if the enum was rewritten.
pub async fn add_member(store: &dyn ObjectStore, enum_id: &str, id: &str) -> Result<bool, CoreError> {
    let mut object = read_enum(store, enum_id).await?;
    let changed = object
        .enum_common_mut()
        .is_some_and(|members| members.insert(id));
    if changed {
        store.set_object(enum_id, RawObject::from(&object)).await?;
        debug!(enum_id, id, "member added");
    }
    Ok(changed)
}

/// Remove every id in `ids` from one enum in a single write.
pub async fn remove_members(
    store: &dyn ObjectStore,
    enum_id: &str,
    ids: &[&str],
) -> Result<bool, CoreError> {
    let mut object = read_enum(store, enum_id).await?;
    let changed = object
        .enum_common_mut()
        .is_some_and(|members| members.remove_all(ids.iter().copied()));
    if changed {
        store.set_object(enum_id, RawObject::from(&object)).await?;
        debug!(enum_id, removed = ids.len(), "members removed");
    }
    Ok(changed)
}

/// Remove `ids` from every enum in `snapshot` that lists any of them.
pub async fn strip_from_all(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    ids: &[&str],
) -> MembershipChange {
    let mut affected: Vec<&str> = snapshot
        .enums_under("enum.")
        .filter(|e| {
            e.enum_common()
                .is_some_and(|members| ids.iter().any(|id| members.contains(id)))
        })
        .map(|e| e.id.as_str())
        .collect();
    affected.sort_unstable();

    let mut outcome = MembershipChange::default();
    for enum_id in affected {
        match remove_members(store, enum_id, ids).await {
            Ok(changed) => outcome.changed |= changed,
            Err(e) => {
                warn!(enum_id, error = %e, "failed to strip members");
                outcome.failures.push(StepFailure {
                    id: enum_id.to_owned(),
                    step: StepKind::RemoveMembership,
                    message: e.to_string(),
                });
            }
        }
    }
    outcome
}

async fn read_enum(store: &dyn ObjectStore, enum_id: &str) -> Result<ManagedObject, CoreError> {
    let raw = store
        .get_object(enum_id)
        .await?
        .ok_or_else(|| CoreError::ObjectNotFound {
            id: enum_id.to_owned(),
        })?;
    let object = ManagedObject::try_from(raw)?;
    if object.enum_common().is_none() {
        return Err(CoreError::MalformedObject {
            id: enum_id.to_owned(),
            message: format!("expected an enum, found {}", object.kind.type_name()),
        });
    }
    Ok(object)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Common, DeviceKind, ObjectKind, StateSlot};

    fn slot(name: &str, id: Option<&str>, required: bool) -> StateSlot {
        StateSlot {
            name: name.into(),
            id: id.map(str::to_owned),
            required,
            default_role: "state".into(),
            value_type: None,
            read: true,
            write: false,
            multiple: false,
            indicator: false,
        }
    }

    fn snapshot() -> NamespaceSnapshot {
        NamespaceSnapshot::from_objects([
            ManagedObject::folder("alias.0.kitchen", "Kitchen"),
            ManagedObject::new("alias.0.kitchen.light", ObjectKind::Channel, Common::named("Light")),
        ])
    }

    #[test]
    fn representative_rolls_up_to_channel() {
        let device = DeviceMatch {
            kind: DeviceKind::Light,
            states: vec![
                slot("SET", Some("alias.0.kitchen.light.SET"), true),
                slot("ON_ACTUAL", None, false),
            ],
        };
        let id = representative_id(&device, &snapshot(), &["alias.0"]).unwrap();
        assert_eq!(id, "alias.0.kitchen.light");
    }

    #[test]
    fn representative_stays_on_state_outside_editable_namespaces() {
        let device = DeviceMatch {
            kind: DeviceKind::Light,
            states: vec![
                slot("SET", Some("hm-rpc.0.ABC.1.STATE"), true),
                slot("UNREACH", None, false),
            ],
        };
        let id = representative_id(&device, &snapshot(), &["alias.0"]).unwrap();
        assert_eq!(id, "hm-rpc.0.ABC.1.STATE");
    }

    #[test]
    fn representative_of_single_state_device_is_the_state() {
        let device = DeviceMatch {
            kind: DeviceKind::Light,
            states: vec![slot("SET", Some("alias.0.kitchen.light.SET"), true)],
        };
        let id = representative_id(&device, &snapshot(), &["alias.0"]).unwrap();
        assert_eq!(id, "alias.0.kitchen.light.SET");
    }

    #[test]
    fn representative_rolls_up_into_folders() {
        let device = DeviceMatch {
            kind: DeviceKind::Temperature,
            states: vec![
                slot("ACTUAL", Some("alias.0.kitchen.temp"), true),
                slot("SECOND", None, false),
            ],
        };
        let id = representative_id(&device, &snapshot(), &["alias.0"]).unwrap();
        assert_eq!(id, "alias.0.kitchen");
    }

    #[test]
    fn representative_stays_on_state_without_container_parent() {
        let device = DeviceMatch {
            kind: DeviceKind::Temperature,
            states: vec![
                slot("ACTUAL", Some("alias.0.hall.temp"), true),
                slot("SECOND", None, false),
            ],
        };
        let id = representative_id(&device, &snapshot(), &["alias.0"]).unwrap();
        assert_eq!(id, "alias.0.hall.temp");
    }

    #[test]
    fn representative_requires_a_required_state_with_id() {
        let device = DeviceMatch {
            kind: DeviceKind::Light,
            states: vec![slot("SET", None, true), slot("ON_ACTUAL", Some("x.0.y"), false)],
        };
        let err = representative_id(&device, &snapshot(), &["alias.0"]).unwrap_err();
        assert!(matches!(err, CoreError::DetectorInvariant { .. }));
    }

    #[test]
    fn category_by_prefix() {
        assert_eq!(EnumCategory::of("enum.rooms.kitchen"), Some(EnumCategory::Rooms));
        assert_eq!(EnumCategory::of("enum.functions.light"), Some(EnumCategory::Functions));
        assert_eq!(EnumCategory::of("enum.favorites.x"), None);
        assert_eq!(EnumCategory::Rooms.to_string(), "rooms");
    }
}
