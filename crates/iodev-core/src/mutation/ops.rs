// ── Device and folder mutations ──
//
// Multi-step read-modify-write sequences against the store. Every step
// is awaited before the next one starts. Store failures are recorded in
// the report and the sequence carries on; only validation errors abort,
// and those are raised before the first write.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use iodev_api::{ObjectStore, RawObject};

use crate::enums;
use crate::error::CoreError;
use crate::model::{Device, ManagedObject, MutationReport, StepKind};
use crate::mutation::plan::{self, CreateTask};
use crate::namespace;
use crate::store::NamespaceSnapshot;
use crate::view::Scope;

/// Decorative folder fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderEdit {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl FolderEdit {
    fn apply(&self, object: &mut ManagedObject) {
        if let Some(name) = &self.name {
            object.common.name = name.clone().into();
        }
        if let Some(icon) = &self.icon {
            object.common.icon = Some(icon.clone()).filter(|i| !i.is_empty());
        }
        if let Some(color) = &self.color {
            object.common.color = Some(color.clone()).filter(|c| !c.is_empty());
        }
    }
}

// ── Task execution ───────────────────────────────────────────────────

/// Write each task's object, then list it in the task's enums.
pub async fn execute_tasks(store: &dyn ObjectStore, tasks: Vec<CreateTask>) -> MutationReport {
    let mut report = MutationReport::started();
    for task in tasks {
        if let Err(e) = store.set_object(&task.id, RawObject::from(task.object)).await {
            warn!(id = %task.id, error = %e, "object write failed");
            report.fail(task.id, StepKind::WriteObject, &e);
            continue;
        }
        report.written.push(task.id.clone());
        for enum_id in &task.enums {
            if let Err(e) = enums::add_member(store, enum_id, &task.id).await {
                warn!(enum_id = %enum_id, id = %task.id, error = %e, "enum attach failed");
                report.fail(enum_id.as_str(), StepKind::AddMembership, &e);
            }
        }
    }
    report
}

// ── Devices ──────────────────────────────────────────────────────────

pub async fn copy_device(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    device: &Device,
    new_container_id: &str,
) -> Result<MutationReport, CoreError> {
    let tasks = plan_checked(store, snapshot, scope, device, new_container_id).await?;
    info!(
        from = %device.channel_id,
        to = new_container_id,
        tasks = tasks.len(),
        "copying device"
    );
    Ok(execute_tasks(store, tasks).await)
}

/// Remove a device, its states and every enum reference to them.
pub async fn delete_device(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    device: &Device,
) -> MutationReport {
    let mut report = MutationReport::started();
    let state_ids: Vec<&str> = device.state_ids().collect();

    let mut referenced: Vec<&str> = vec![device.channel_id.as_str()];
    referenced.extend(state_ids.iter().copied());
    let stripped = enums::strip_from_all(store, snapshot, &referenced).await;
    report.failures.extend(stripped.failures);

    for id in &state_ids {
        delete_one(store, id, &mut report).await;
    }
    if device.main_state_id() != Some(device.channel_id.as_str()) {
        delete_one(store, &device.channel_id, &mut report).await;
    }

    if namespace::is_below(&device.channel_id, &scope.config.linked_namespace) {
        clear_linked_markers(store, snapshot, scope, &state_ids, &mut report).await;
    }
    info!(
        id = %device.channel_id,
        deleted = report.deleted.len(),
        failures = report.failures.len(),
        "device deleted"
    );
    report
}

/// Copy to `new_container_id`, then delete the original if it is editable.
pub async fn move_device(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    device: &Device,
    new_container_id: &str,
) -> Result<MutationReport, CoreError> {
    if !scope.is_editable(&device.channel_id) {
        debug!(id = %device.channel_id, "source is read-only, copied only");
        return copy_device(store, snapshot, scope, device, new_container_id).await;
    }
    info!(from = %device.channel_id, to = new_container_id, "moving device");
    transplant(store, snapshot, scope, device, new_container_id).await
}

/// `plan_copy`, with the destination checked against the store itself.
/// The snapshot can trail the store by one debounce period.
async fn plan_checked(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    device: &Device,
    new_container_id: &str,
) -> Result<Vec<CreateTask>, CoreError> {
    let tasks = plan::plan_copy(device, new_container_id, snapshot, scope)?;
    ensure_vacant(store, new_container_id).await?;
    Ok(tasks)
}

async fn ensure_vacant(store: &dyn ObjectStore, id: &str) -> Result<(), CoreError> {
    if store.get_object(id).await?.is_some() {
        return Err(CoreError::validation(format!("{id} already exists")));
    }
    Ok(())
}

/// Copy `device` to `target` and remove every source object.
///
/// Objects below the source container that the copy does not cover are
/// relocated under `target`. One whose new id a copied state already took
/// is deleted with the source. A source whose copy failed is kept.
async fn transplant(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    device: &Device,
    target: &str,
) -> Result<MutationReport, CoreError> {
    let tasks = plan_checked(store, snapshot, scope, device, target).await?;
    let planned: Vec<(String, Option<String>)> =
        tasks.iter().map(|t| (t.id.clone(), t.origin.clone())).collect();
    let origins: BTreeSet<&str> = planned.iter().filter_map(|(_, o)| o.as_deref()).collect();
    let mut report = execute_tasks(store, tasks).await;

    let mut doomed: Vec<&str> = planned
        .iter()
        .filter(|(id, _)| report.written.contains(id))
        .filter_map(|(_, origin)| origin.as_deref())
        .filter(|origin| *origin != device.channel_id && !device.state_ids().any(|s| s == *origin))
        .collect();

    if !device.is_single_state() {
        let mut rest: Vec<&ManagedObject> = snapshot
            .descendants(&device.channel_id)
            .filter(|o| !origins.contains(o.id.as_str()))
            .collect();
        rest.sort_by(|a, b| a.id.cmp(&b.id));
        for object in rest {
            match namespace::rebase(&object.id, &device.channel_id, target) {
                Some(new_id) if !planned.iter().any(|(id, _)| *id == new_id) => {
                    relocate(store, snapshot, object, &new_id, &mut report).await;
                }
                _ => {
                    debug!(id = %object.id, "dropping child shadowed by a copied state");
                    doomed.push(object.id.as_str());
                }
            }
        }
    }

    if !doomed.is_empty() {
        let stripped = enums::strip_from_all(store, snapshot, &doomed).await;
        report.failures.extend(stripped.failures);
        // Deepest first, so no child outlives its parent.
        doomed.sort_by_key(|id| std::cmp::Reverse(namespace::segment_count(id)));
        for id in doomed {
            delete_one(store, id, &mut report).await;
        }
    }
    report.absorb(delete_device(store, snapshot, scope, device).await);
    Ok(report)
}

async fn delete_one(store: &dyn ObjectStore, id: &str, report: &mut MutationReport) {
    match store.del_object(id).await {
        Ok(()) => report.deleted.push(id.to_owned()),
        Err(e) if e.is_not_found() => debug!(id, "already gone"),
        Err(e) => {
            warn!(id, error = %e, "delete failed");
            report.fail(id, StepKind::DeleteObject, &e);
        }
    }
}

/// Drop the `custom[<linked namespace>]` entry of objects that pointed at
/// one of the deleted linked states.
async fn clear_linked_markers(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    state_ids: &[&str],
    report: &mut MutationReport,
) {
    let key = scope.config.linked_namespace.as_str();
    let mut sources: Vec<&ManagedObject> = snapshot
        .iter()
        .map(|(_, o)| o)
        .filter(|o| {
            o.common
                .custom
                .as_ref()
                .and_then(|c| c.get(key))
                .and_then(|entry| entry.get("linkedId"))
                .and_then(Value::as_str)
                .is_some_and(|linked| state_ids.contains(&linked))
        })
        .collect();
    sources.sort_by(|a, b| a.id.cmp(&b.id));

    for source in sources {
        let mut object = source.clone();
        if let Some(custom) = object.common.custom.as_mut() {
            custom.remove(key);
        }
        if object.common.custom.as_ref().is_some_and(serde_json::Map::is_empty) {
            object.common.custom = None;
        }
        let id = object.id.clone();
        match store.set_object(&id, RawObject::from(object)).await {
            Ok(()) => report.written.push(id),
            Err(e) => {
                warn!(id = %id, error = %e, "failed to clear linked marker");
                report.fail(id, StepKind::WriteObject, &e);
            }
        }
    }
}

// ── Folders ──────────────────────────────────────────────────────────

/// Create an empty folder named `name` below `parent`.
///
/// `parent` may be the alias namespace root. Returns the new id.
pub async fn create_folder(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    parent: &str,
    name: &str,
) -> Result<String, CoreError> {
    let segment = namespace::sanitize_segment(name.trim());
    if segment.is_empty() {
        return Err(CoreError::validation("folder name is empty"));
    }
    let id = namespace::join(parent, &segment);
    plan::validate_destination(&id, snapshot, scope)?;
    ensure_vacant(store, &id).await?;
    store
        .set_object(&id, RawObject::from(ManagedObject::folder(&id, name.trim())))
        .await?;
    info!(id = %id, "folder created");
    Ok(id)
}

/// Apply decorative edits in place. A synthesized folder is materialized.
pub async fn update_folder(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    id: &str,
    edit: &FolderEdit,
) -> Result<(), CoreError> {
    if !scope.is_editable(id) {
        return Err(CoreError::validation(format!("{id} is not editable")));
    }
    let mut object = match snapshot.get(id) {
        Some(existing) if existing.is_folder() => existing.clone(),
        Some(other) => {
            return Err(CoreError::validation(format!(
                "{id} is a {}, not a folder",
                other.kind.type_name()
            )));
        }
        None => ManagedObject::folder(id, namespace::last_segment(id)),
    };
    edit.apply(&mut object);
    store.set_object(id, RawObject::from(object)).await?;
    debug!(id, "folder updated");
    Ok(())
}

/// Rename a folder. Changes the id only when the name sanitizes to a
/// different segment; otherwise the folder is edited in place.
pub async fn rename_folder(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    devices: &[Device],
    id: &str,
    edit: &FolderEdit,
) -> Result<MutationReport, CoreError> {
    let segment = match &edit.name {
        Some(name) => namespace::sanitize_segment(name.trim()),
        None => namespace::last_segment(id).to_owned(),
    };
    if segment.is_empty() {
        return Err(CoreError::validation("folder name is empty"));
    }
    if segment == namespace::last_segment(id) {
        update_folder(store, snapshot, scope, id, edit).await?;
        let mut report = MutationReport::started();
        report.written.push(id.to_owned());
        return Ok(report);
    }
    let new_id = namespace::join(namespace::parent_id(id), &segment);
    move_folder(store, snapshot, scope, devices, id, &new_id, edit).await
}

/// Move the folder `old_id` and everything below it to `new_id`.
///
/// Folders are recreated first, parents before children. Devices move
/// through copy and delete; other objects are rewritten at their new id
/// with their enum memberships carried over. Old folders go last,
/// deepest first.
pub async fn move_folder(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    devices: &[Device],
    old_id: &str,
    new_id: &str,
    edit: &FolderEdit,
) -> Result<MutationReport, CoreError> {
    validate_folder_move(snapshot, scope, old_id, new_id)?;
    ensure_vacant(store, new_id).await?;
    info!(from = old_id, to = new_id, "moving folder");

    let mut descendants: Vec<&ManagedObject> = snapshot.descendants(old_id).collect();
    descendants.sort_by(|a, b| a.id.cmp(&b.id));

    let moved_devices: Vec<&Device> = devices
        .iter()
        .filter(|d| namespace::is_below(&d.channel_id, old_id))
        .collect();
    let mut handled: BTreeSet<&str> = BTreeSet::new();
    for device in moved_devices.iter().copied() {
        handled.insert(device.channel_id.as_str());
        handled.extend(device.state_ids());
    }
    // Children of moved containers travel with their device.
    let inside_device = |id: &str| {
        moved_devices
            .iter()
            .any(|d| !d.is_single_state() && namespace::is_below(id, &d.channel_id))
    };

    let mut report = MutationReport::started();

    // Folders, root first.
    let mut root = match snapshot.get(old_id) {
        Some(existing) => existing.duplicate_as(new_id),
        None => ManagedObject::folder(new_id, namespace::last_segment(old_id)),
    };
    edit.apply(&mut root);
    write_one(store, root, &mut report).await;
    let folders: Vec<&ManagedObject> = descendants
        .iter()
        .copied()
        .filter(|o| o.is_folder() && !inside_device(o.id.as_str()))
        .collect();
    for folder in &folders {
        if let Some(target) = namespace::rebase(&folder.id, old_id, new_id) {
            write_one(store, folder.duplicate_as(target), &mut report).await;
        }
    }

    // Devices.
    for device in &moved_devices {
        let Some(target) = namespace::rebase(&device.channel_id, old_id, new_id) else {
            continue;
        };
        match transplant(store, snapshot, scope, device, &target).await {
            Ok(part) => report.absorb(part),
            Err(e) => {
                warn!(id = %device.channel_id, error = %e, "device move failed");
                report.fail(device.channel_id.as_str(), StepKind::WriteObject, &e);
            }
        }
    }

    // Everything else: relocate and carry enum memberships.
    for object in descendants.iter().copied().filter(|o| {
        !o.is_folder() && !handled.contains(o.id.as_str()) && !inside_device(o.id.as_str())
    }) {
        let Some(target) = namespace::rebase(&object.id, old_id, new_id) else {
            continue;
        };
        relocate(store, snapshot, object, &target, &mut report).await;
    }

    // Old folders, deepest first; the moved root last.
    let mut doomed: Vec<&str> = folders.iter().map(|f| f.id.as_str()).collect();
    doomed.sort_by_key(|id| std::cmp::Reverse(namespace::segment_count(id)));
    doomed.push(old_id);
    for id in doomed {
        delete_one(store, id, &mut report).await;
    }
    Ok(report)
}

fn validate_folder_move(
    snapshot: &NamespaceSnapshot,
    scope: Scope<'_>,
    old_id: &str,
    new_id: &str,
) -> Result<(), CoreError> {
    if !scope.is_editable(old_id) {
        return Err(CoreError::validation(format!("{old_id} is not editable")));
    }
    if snapshot.get(old_id).is_some_and(|o| !o.is_folder()) {
        return Err(CoreError::validation(format!("{old_id} is not a folder")));
    }
    if namespace::is_within(new_id, old_id) {
        return Err(CoreError::validation(format!("cannot move {old_id} into itself")));
    }
    plan::validate_destination(new_id, snapshot, scope)
}

async fn write_one(store: &dyn ObjectStore, object: ManagedObject, report: &mut MutationReport) {
    let id = object.id.clone();
    match store.set_object(&id, RawObject::from(object)).await {
        Ok(()) => report.written.push(id),
        Err(e) => {
            warn!(id = %id, error = %e, "object write failed");
            report.fail(id, StepKind::WriteObject, &e);
        }
    }
}

/// Rewrite `object` at `target`, swap its id in every enum, delete it.
async fn relocate(
    store: &dyn ObjectStore,
    snapshot: &NamespaceSnapshot,
    object: &ManagedObject,
    target: &str,
    report: &mut MutationReport,
) {
    let written = report.written.len();
    write_one(store, object.duplicate_as(target), report).await;
    if report.written.len() == written {
        return;
    }
    let all_enums = snapshot.enums_under("enum.").map(|e| e.id.as_str());
    for enum_id in enums::memberships_of(&object.id, all_enums, snapshot) {
        if let Err(e) = enums::add_member(store, &enum_id, target).await {
            report.fail(enum_id.as_str(), StepKind::AddMembership, &e);
            continue;
        }
        if let Err(e) = enums::remove_members(store, &enum_id, &[object.id.as_str()]).await {
            report.fail(enum_id, StepKind::RemoveMembership, &e);
        }
    }
    delete_one(store, &object.id, report).await;
}
