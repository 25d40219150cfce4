// ── Copy planning ──
//
// Turns a detected device into the list of objects a copy has to write.
// Pure: reads the snapshot, touches nothing.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{
    AliasLink, Common, Device, ManagedObject, ObjectKind, StateCommon, StateSlot,
};
use crate::namespace;
use crate::store::NamespaceSnapshot;
use crate::view::Scope;

/// Back-reference written into `native` of states copied from a foreign id.
pub const ORIGINAL_ID_KEY: &str = "originalId";

/// One object to create.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTask {
    pub id: String,
    pub object: ManagedObject,
    /// Enum ids to list `id` in once it exists.
    pub enums: Vec<String>,
    /// Source object, if this is a copy.
    pub origin: Option<String>,
}

/// Give repeated slot names distinct values.
///
/// The first occurrence keeps its name. Later ones get the upper-cased
/// last segment of their default role appended, and a counter when that
/// still collides.
pub fn rename_multiple_entries(states: &mut [StateSlot]) {
    let mut taken: BTreeSet<String> = BTreeSet::new();
    for slot in states.iter_mut() {
        if taken.insert(slot.name.clone()) {
            continue;
        }
        let discriminator = namespace::last_segment(&slot.default_role).to_uppercase();
        let base = if discriminator.is_empty() {
            slot.name.clone()
        } else {
            format!("{}_{discriminator}", slot.name)
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        debug!(from = %slot.name, to = %candidate, "renamed duplicate state");
        slot.name = candidate.clone();
        taken.insert(candidate);
    }
}

/// Plan a copy of `device` to `new_container_id`.
///
/// Yields one container task followed by one task per state that has an
/// id, then the container's unmatched children.
pub fn plan_copy(
    device: &Device,
    new_container_id: &str,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
) -> Result<Vec<CreateTask>, CoreError> {
    validate_destination(new_container_id, snapshot, scope)?;

    let mut states = device.states.clone();
    rename_multiple_entries(&mut states);

    let mut tasks = vec![container_task(device, new_container_id, snapshot)];
    let mut placed: BTreeSet<String> = BTreeSet::new();
    let mut placed_names: BTreeSet<&str> = BTreeSet::new();
    let mut copied: BTreeSet<&str> = BTreeSet::new();

    for slot in &states {
        let Some(source_id) = slot.id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        let new_id = namespace::join(new_container_id, &namespace::sanitize_segment(&slot.name));
        if !placed.insert(new_id.clone()) {
            continue;
        }
        copied.insert(source_id);
        placed_names.insert(slot.name.as_str());
        let object = match snapshot.get(source_id) {
            Some(source) => copy_state(source, &new_id, scope),
            None => state_from_slot(slot, source_id, &new_id, scope),
        };
        tasks.push(CreateTask {
            id: new_id,
            object,
            enums: Vec::new(),
            origin: Some(source_id.to_owned()),
        });
    }

    // Children of the source container the pattern left alone. One whose
    // id segment or name matches a placed state is dropped.
    if !device.is_single_state() {
        let language = scope.config.language.as_str();
        let mut extras: Vec<&ManagedObject> = snapshot
            .descendants(&device.channel_id)
            .filter(|o| namespace::parent_id(&o.id) == device.channel_id)
            .filter(|o| o.state().is_some() && !copied.contains(o.id.as_str()))
            .collect();
        extras.sort_by(|a, b| a.id.cmp(&b.id));
        for source in extras {
            let new_id = namespace::join(new_container_id, namespace::last_segment(&source.id));
            if placed_names.contains(source.common.name.resolve(language))
                || !placed.insert(new_id.clone())
            {
                debug!(id = %source.id, "skipping pass-through state, name taken");
                continue;
            }
            tasks.push(CreateTask {
                object: copy_state(source, &new_id, scope),
                id: new_id,
                enums: Vec::new(),
                origin: Some(source.id.clone()),
            });
        }
    }
    Ok(tasks)
}

/// The destination must be a new id in an editable namespace.
pub fn validate_destination(
    id: &str,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
) -> Result<(), CoreError> {
    if id.is_empty() || namespace::last_segment(id).is_empty() {
        return Err(CoreError::validation("destination id is empty"));
    }
    if !scope.is_editable(id) {
        return Err(CoreError::validation(format!("{id} is not in an editable namespace")));
    }
    if snapshot.contains(id) {
        return Err(CoreError::validation(format!("{id} already exists")));
    }
    Ok(())
}

fn container_task(device: &Device, new_id: &str, snapshot: &NamespaceSnapshot) -> CreateTask {
    let role = snapshot
        .get(&device.channel_id)
        .filter(|o| o.is_container())
        .and_then(|o| o.common.role.clone());
    let common = Common {
        name: device.name.clone().into(),
        icon: device.icon.clone(),
        color: device.color.clone(),
        role,
        ..Common::default()
    };
    CreateTask {
        id: new_id.to_owned(),
        object: ManagedObject::new(new_id, ObjectKind::Channel, common),
        enums: device.rooms.iter().chain(&device.functions).cloned().collect(),
        origin: Some(device.channel_id.clone()),
    }
}

/// `true` for ids that already are aliases of something else.
fn is_alias_source(id: &str, scope: Scope<'_>) -> bool {
    scope.is_alias(id) || namespace::is_below(id, &scope.config.linked_namespace)
}

fn copy_state(source: &ManagedObject, new_id: &str, scope: Scope<'_>) -> ManagedObject {
    let mut object = source.duplicate_as(new_id);
    object.common.custom = None;
    object.common.smart_name = None;

    let alias_source = is_alias_source(&source.id, scope);
    if let Some(state) = object.state_mut() {
        if !alias_source || state.alias.is_none() {
            state.alias = Some(AliasLink::to(source.id.clone()));
        }
    }
    if !alias_source {
        object
            .native
            .insert(ORIGINAL_ID_KEY.to_owned(), Value::String(source.id.clone()));
    }
    object
}

/// A state for a slot whose object is missing from the snapshot.
fn state_from_slot(slot: &StateSlot, source_id: &str, new_id: &str, scope: Scope<'_>) -> ManagedObject {
    let state = StateCommon {
        value_type: slot.value_type.clone(),
        read: Some(slot.read),
        write: Some(slot.write),
        alias: Some(AliasLink::to(source_id)),
        ..StateCommon::default()
    };
    let common = Common {
        name: slot.name.clone().into(),
        role: Some(slot.default_role.clone()),
        ..Common::default()
    };
    let mut object = ManagedObject::new(new_id, ObjectKind::State(state), common);
    if !is_alias_source(source_id, scope) {
        object
            .native
            .insert(ORIGINAL_ID_KEY.to_owned(), Value::String(source_id.to_owned()));
    }
    object
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::model::DeviceKind;

    fn slot(name: &str, role: &str, id: Option<&str>) -> StateSlot {
        StateSlot {
            name: name.into(),
            id: id.map(str::to_owned),
            required: false,
            default_role: role.into(),
            value_type: Some("number".into()),
            read: true,
            write: true,
            multiple: false,
            indicator: false,
        }
    }

    #[test]
    fn duplicate_names_get_role_suffix() {
        let mut states = vec![
            slot("LEVEL", "level.dimmer", None),
            slot("LEVEL", "level.blind", None),
            slot("LEVEL", "level.blind", None),
            slot("ON", "switch", None),
        ];
        rename_multiple_entries(&mut states);
        let names: Vec<&str> = states.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["LEVEL", "LEVEL_BLIND", "LEVEL_BLIND_2", "ON"]);
    }

    #[test]
    fn foreign_states_get_alias_and_original_id() {
        let mut common = Common::named("State");
        common.custom = Some(serde_json::Map::new());
        let source = ManagedObject::new(
            "hm-rpc.0.ABC.1.STATE",
            ObjectKind::State(StateCommon::default()),
            common,
        );
        let config = CoreConfig::default();
        let copy = copy_state(&source, "alias.0.x.SET", Scope::new(&config, false));
        assert!(copy.common.custom.is_none());
        let alias = copy.state().and_then(|s| s.alias.as_ref()).unwrap();
        assert_eq!(alias.id.read_id(), "hm-rpc.0.ABC.1.STATE");
        assert_eq!(copy.native[ORIGINAL_ID_KEY], "hm-rpc.0.ABC.1.STATE");
    }

    #[test]
    fn alias_states_keep_their_target() {
        let source = ManagedObject::new(
            "alias.0.a.SET",
            ObjectKind::State(StateCommon {
                alias: Some(AliasLink::to("zigbee.0.lamp.state")),
                ..StateCommon::default()
            }),
            Common::named("SET"),
        );
        let config = CoreConfig::default();
        let copy = copy_state(&source, "alias.0.b.SET", Scope::new(&config, false));
        let alias = copy.state().and_then(|s| s.alias.as_ref()).unwrap();
        assert_eq!(alias.id.read_id(), "zigbee.0.lamp.state");
        assert!(!copy.native.contains_key(ORIGINAL_ID_KEY));
    }

    #[test]
    fn pass_through_skips_states_named_like_placed_ones() {
        let state = |id: &str, name: &str| {
            ManagedObject::new(id, ObjectKind::State(StateCommon::default()), Common::named(name))
        };
        let snapshot = NamespaceSnapshot::from_objects([
            ManagedObject::new("alias.0.a", ObjectKind::Channel, Common::named("A")),
            state("alias.0.a.SET", "SET"),
            state("alias.0.a.switch", "SET"),
            state("alias.0.a.NOTE", "Note"),
        ]);
        let device = Device {
            kind: DeviceKind::Socket,
            states: vec![StateSlot {
                required: true,
                ..slot("SET", "switch", Some("alias.0.a.SET"))
            }],
            channel_id: "alias.0.a".into(),
            rooms: Vec::new(),
            functions: Vec::new(),
            name: "A".into(),
            icon: None,
            color: None,
        };
        let config = CoreConfig::default();
        let tasks = plan_copy(&device, "alias.0.b", &snapshot, Scope::new(&config, false)).unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["alias.0.b", "alias.0.b.SET", "alias.0.b.NOTE"]);
    }

    #[test]
    fn destination_must_be_new_and_editable() {
        let snapshot = NamespaceSnapshot::from_objects([ManagedObject::folder("alias.0.a", "A")]);
        let config = CoreConfig::default();
        let scope = Scope::new(&config, false);
        assert!(validate_destination("alias.0.a", &snapshot, scope).is_err());
        assert!(validate_destination("hm-rpc.0.x", &snapshot, scope).is_err());
        assert!(validate_destination("alias.0.automatically_detected.x", &snapshot, scope).is_err());
        assert!(validate_destination("alias.0.b", &snapshot, scope).is_ok());

        let device = Device {
            kind: DeviceKind::Light,
            states: Vec::new(),
            channel_id: "alias.0.a".into(),
            rooms: Vec::new(),
            functions: Vec::new(),
            name: "A".into(),
            icon: None,
            color: None,
        };
        let err = plan_copy(&device, "alias.0.a", &snapshot, scope).unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }
}
