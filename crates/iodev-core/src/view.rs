// ── View pipeline ──
//
// snapshot → detection → enrichment → display records → tree → filter.
// Pure over its inputs; the reconciler decides when to run it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::detect::{DetectOptions, DetectorAdapter};
use crate::enums::{self, EnumCategory};
use crate::error::CoreError;
use crate::filter::{FilterPredicate, apply_filter};
use crate::model::{
    Device, DeviceMatch, DisplayRecord, ManagedObject, NodeKind, ObjectKind, TreeNode, TreeOptions,
};
use crate::namespace::{self, AUTO_DETECTED_SEGMENT, LINKED_DEVICES_SEGMENT};
use crate::store::NamespaceSnapshot;
use crate::tree;

/// Id prefixes never scanned for foreign devices.
const SYSTEM_PREFIXES: [&str; 3] = ["system.", "enum.", "_design."];

// ── UI state ─────────────────────────────────────────────────────────

/// User-local state that survives every recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UiState {
    pub expanded: BTreeSet<String>,
    pub selected: Option<String>,
    pub filter: FilterPredicate,
}

/// Everything a consumer renders, published as one value.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub snapshot: NamespaceSnapshot,
    pub devices: Arc<Vec<Device>>,
    pub nodes: Arc<Vec<TreeNode>>,
    pub ui: UiState,
    /// The linked-devices integration has an instance.
    pub linked_active: bool,
    /// Completed recompute passes.
    pub recomputes: u64,
}

impl ViewState {
    pub fn device(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    pub fn node(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Index of the device whose representative id is `channel_id`.
    pub fn device_index_of(&self, channel_id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.channel_id == channel_id)
    }
}

// ── Namespace scope ──────────────────────────────────────────────────

/// Which namespaces are editable, and how ids map onto display nodes.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub config: &'a CoreConfig,
    pub linked_active: bool,
}

impl<'a> Scope<'a> {
    pub fn new(config: &'a CoreConfig, linked_active: bool) -> Self {
        Self {
            config,
            linked_active,
        }
    }

    pub fn editable_namespaces(&self) -> Vec<&'a str> {
        let mut namespaces = vec![self.config.alias_namespace.as_str()];
        if self.linked_active {
            namespaces.push(self.config.linked_namespace.as_str());
        }
        namespaces
    }

    pub fn is_alias(&self, id: &str) -> bool {
        namespace::is_below(id, &self.config.alias_namespace)
    }

    pub fn is_linked(&self, id: &str) -> bool {
        self.linked_active && namespace::is_below(id, &self.config.linked_namespace)
    }

    /// Inside a namespace the user may edit, outside the pseudo-folders.
    pub fn is_editable(&self, id: &str) -> bool {
        (self.is_alias(id) && !namespace::is_in_reserved_folder(id, &self.config.alias_namespace))
            || self.is_linked(id)
    }

    fn is_foreign_candidate(&self, id: &str) -> bool {
        self.config.detect_foreign
            && !namespace::is_within(id, &self.config.alias_namespace)
            && !self.is_linked(id)
            && !SYSTEM_PREFIXES.iter().any(|p| id.starts_with(p))
    }

    /// Display node id for an object id.
    pub fn display_id(&self, id: &str) -> String {
        let alias = &self.config.alias_namespace;
        if self.is_alias(id) {
            id.to_owned()
        } else if self.is_linked(id) {
            let relative = namespace::relative_to(id, &self.config.linked_namespace);
            namespace::join(&namespace::join(alias, LINKED_DEVICES_SEGMENT), relative)
        } else {
            namespace::join(
                &namespace::join(alias, AUTO_DETECTED_SEGMENT),
                &namespace::sanitize_segment(id),
            )
        }
    }
}

// ── Detection and enrichment ─────────────────────────────────────────

/// Detect and enrich every device in scope, in id order. Devices without
/// a usable representative id are skipped and returned as errors.
pub fn detect_devices(
    adapter: &DetectorAdapter,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
) -> (Vec<Device>, Vec<CoreError>) {
    let keys = adapter.sorted_keys(snapshot);
    let options = DetectOptions {
        sorted_keys_hint: Some(Arc::clone(&keys)),
        force_rebuild_index: false,
    };
    let editable = scope.editable_namespaces();
    let room_ids = enums::enum_ids(snapshot, EnumCategory::Rooms);
    let function_ids = enums::enum_ids(snapshot, EnumCategory::Functions);

    let mut devices = Vec::new();
    let mut skipped = Vec::new();
    for id in keys.iter() {
        let in_scope = scope.is_editable(id) || scope.is_foreign_candidate(id);
        let plausible = snapshot
            .get(id)
            .is_some_and(|o| o.is_container() || o.state().is_some());
        if !in_scope || !plausible {
            continue;
        }
        let Some(matches) = adapter.detect(id, snapshot, &options) else {
            continue;
        };
        for found in matches {
            match enrich(found, snapshot, &editable, &room_ids, &function_ids, &scope.config.language) {
                Ok(device) => devices.push(device),
                Err(e) => {
                    warn!(root = %id, error = %e, "device skipped");
                    skipped.push(e);
                }
            }
        }
    }
    debug!(devices = devices.len(), skipped = skipped.len(), "detection pass finished");
    (devices, skipped)
}

fn enrich(
    found: DeviceMatch,
    snapshot: &NamespaceSnapshot,
    editable: &[&str],
    room_ids: &[String],
    function_ids: &[String],
    language: &str,
) -> Result<Device, CoreError> {
    let channel_id = enums::representative_id(&found, snapshot, editable)?;
    let representative = snapshot.get(&channel_id);
    let name = representative
        .map(|o| o.common.name.resolve(language).to_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| namespace::last_segment(&channel_id).to_owned());

    Ok(Device {
        kind: found.kind,
        rooms: enums::memberships_of(&channel_id, room_ids.iter().map(String::as_str), snapshot),
        functions: enums::memberships_of(
            &channel_id,
            function_ids.iter().map(String::as_str),
            snapshot,
        ),
        icon: representative.and_then(|o| o.common.icon.clone()),
        color: representative.and_then(|o| o.common.color.clone()),
        states: found.states,
        channel_id,
        name,
    })
}

// ── Display records ──────────────────────────────────────────────────

fn record_for(object: &ManagedObject, kind: NodeKind, language: &str) -> DisplayRecord {
    DisplayRecord {
        name: object.common.name.resolve(language).to_owned(),
        icon: object.common.icon.clone(),
        color: object.common.color.clone(),
        kind,
        nondeletable: false,
        device_index: None,
    }
}

/// Merge container objects and devices into tree input records.
pub fn display_records(
    snapshot: &NamespaceSnapshot,
    devices: &[Device],
    scope: Scope<'_>,
) -> HashMap<String, DisplayRecord> {
    let config = scope.config;
    let language = config.language.as_str();
    let mut records: HashMap<String, DisplayRecord> = HashMap::new();

    // Folders of the editable namespaces.
    for (id, object) in snapshot.iter() {
        if object.is_folder() && (scope.is_alias(id) || scope.is_linked(id)) {
            records.insert(scope.display_id(id), record_for(object, NodeKind::Folder, language));
        }
    }

    // Devices; a second device on the same root gets a `#n` suffix.
    let mut claimed: BTreeSet<&str> = BTreeSet::new();
    for (index, device) in devices.iter().enumerate() {
        claimed.insert(device.channel_id.as_str());
        let base = scope.display_id(&device.channel_id);
        let mut node_id = base.clone();
        let mut n = 1;
        while records.get(&node_id).is_some_and(|r| r.kind == NodeKind::Device) {
            n += 1;
            node_id = format!("{base}#{n}");
        }
        records.insert(
            node_id,
            DisplayRecord {
                name: device.name.clone(),
                icon: device.icon.clone(),
                color: device.color.clone(),
                kind: NodeKind::Device,
                nondeletable: !scope.is_editable(&device.channel_id),
                device_index: Some(index),
            },
        );
    }

    // Channels and devices no pattern claimed.
    for (id, object) in snapshot.iter() {
        let plain = matches!(object.kind, ObjectKind::Channel | ObjectKind::Device);
        if plain && (scope.is_alias(id) || scope.is_linked(id)) && !claimed.contains(id) {
            records
                .entry(scope.display_id(id))
                .or_insert_with(|| record_for(object, NodeKind::Object, language));
        }
    }

    // Reserved pseudo-folders, only when populated.
    let alias = &config.alias_namespace;
    for (segment, title) in [
        (AUTO_DETECTED_SEGMENT, "Automatically detected"),
        (LINKED_DEVICES_SEGMENT, "Linked devices"),
    ] {
        let folder_id = namespace::join(alias, segment);
        if records.keys().any(|id| namespace::is_below(id, &folder_id)) {
            let mut record = DisplayRecord::folder(title);
            record.nondeletable = true;
            records.insert(folder_id, record);
        }
    }
    for (id, record) in &mut records {
        if record.kind == NodeKind::Folder && namespace::is_in_reserved_folder(id, alias) {
            record.nondeletable = true;
        }
    }
    records
}

// ── Full pass ────────────────────────────────────────────────────────

/// Output of one recompute.
#[derive(Debug)]
pub struct Computed {
    pub devices: Vec<Device>,
    pub nodes: Vec<TreeNode>,
    pub skipped: Vec<CoreError>,
}

/// Run the whole pipeline over `snapshot`.
pub fn compute(
    adapter: &DetectorAdapter,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    filter: &FilterPredicate,
) -> Result<Computed, CoreError> {
    let (devices, skipped) = detect_devices(adapter, snapshot, scope);
    let records = display_records(snapshot, &devices, scope);
    let options = TreeOptions {
        root: None,
        trailing_ids: scope.config.trailing_ids.clone(),
        alias_namespace: scope.config.alias_namespace.clone(),
    };
    let mut nodes = tree::synthesize(&records, &options)?;
    apply_filter(&mut nodes, &devices, filter);
    Ok(Computed {
        devices,
        nodes,
        skipped,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Common, StateCommon};

    fn state(id: &str, role: &str, value_type: &str) -> ManagedObject {
        let mut common = Common::named(namespace::last_segment(id));
        common.role = Some(role.to_owned());
        ManagedObject::new(
            id,
            ObjectKind::State(StateCommon {
                value_type: Some(value_type.to_owned()),
                ..StateCommon::default()
            }),
            common,
        )
    }

    fn channel(id: &str, name: &str) -> ManagedObject {
        ManagedObject::new(id, ObjectKind::Channel, Common::named(name))
    }

    #[test]
    fn foreign_and_linked_devices_go_to_pseudo_folders() {
        let snapshot = NamespaceSnapshot::from_objects([
            channel("alias.0.kitchen.light", "Light"),
            state("alias.0.kitchen.light.SET", "switch.light", "boolean"),
            channel("hm-rpc.0.ABC.1", "Actor"),
            state("hm-rpc.0.ABC.1.STATE", "switch", "boolean"),
            channel("linkeddevices.0.bath.fan", "Fan"),
            state("linkeddevices.0.bath.fan.SET", "switch", "boolean"),
        ]);
        let config = CoreConfig::default();
        let adapter = DetectorAdapter::builtin();
        let computed = compute(
            &adapter,
            &snapshot,
            Scope::new(&config, true),
            &FilterPredicate::default(),
        )
        .unwrap();

        let ids: Vec<&str> = computed.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "alias.0.kitchen",
                "alias.0.kitchen.light",
                "alias.0.automatically_detected",
                "alias.0.automatically_detected.hm-rpc_0_ABC_1_STATE",
                "alias.0.linked_devices",
                "alias.0.linked_devices.bath",
                "alias.0.linked_devices.bath.fan",
            ]
        );
        let auto = computed
            .nodes
            .iter()
            .find(|n| n.id == "alias.0.automatically_detected")
            .unwrap();
        assert!(auto.nondeletable);
        // Foreign devices are read-only; linked ones stay deletable.
        let foreign = computed
            .nodes
            .iter()
            .find(|n| n.id == "alias.0.automatically_detected.hm-rpc_0_ABC_1_STATE")
            .unwrap();
        assert!(foreign.nondeletable);
        let fan = computed.nodes.iter().find(|n| n.id == "alias.0.linked_devices.bath.fan").unwrap();
        assert_eq!(fan.kind, NodeKind::Device);
        assert!(!fan.nondeletable);
    }

    #[test]
    fn linked_namespace_is_foreign_when_inactive() {
        let snapshot = NamespaceSnapshot::from_objects([
            channel("linkeddevices.0.bath.fan", "Fan"),
            state("linkeddevices.0.bath.fan.SET", "switch", "boolean"),
        ]);
        let config = CoreConfig {
            detect_foreign: false,
            ..CoreConfig::default()
        };
        let adapter = DetectorAdapter::builtin();
        let (devices, _) = detect_devices(&adapter, &snapshot, Scope::new(&config, false));
        assert!(devices.is_empty());
        let (devices, _) = detect_devices(&adapter, &snapshot, Scope::new(&config, true));
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].channel_id, "linkeddevices.0.bath.fan");
    }

    #[test]
    fn unclaimed_channels_become_object_nodes() {
        let snapshot = NamespaceSnapshot::from_objects([channel("alias.0.misc.box", "Box")]);
        let config = CoreConfig::default();
        let adapter = DetectorAdapter::builtin();
        let computed =
            compute(&adapter, &snapshot, Scope::new(&config, false), &FilterPredicate::default())
                .unwrap();
        let node = computed.nodes.iter().find(|n| n.id == "alias.0.misc.box").unwrap();
        assert_eq!(node.kind, NodeKind::Object);
        assert_eq!(node.title, "Box");
    }
}
