// ── Filter / search overlay ──
//
// Computes `visible` and `has_visible_children_count` for every node.
// Pure: running it twice with the same predicate changes nothing.

use serde::{Deserialize, Serialize};

use crate::model::{Device, DeviceKind, TreeNode};

/// Active filter dimensions. Empty text and `None` mean "off".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPredicate {
    /// Case-insensitive substring of title or id.
    pub text: String,
    pub device_kind: Option<DeviceKind>,
    /// Room enum id.
    pub room: Option<String>,
    /// Function enum id.
    pub function: Option<String>,
}

impl FilterPredicate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        !self.text.trim().is_empty() || self.has_device_criteria()
    }

    fn has_device_criteria(&self) -> bool {
        self.device_kind.is_some() || self.room.is_some() || self.function.is_some()
    }

    fn matches_device(&self, device: &Device) -> bool {
        self.device_kind.is_none_or(|kind| device.kind == kind)
            && self.room.as_ref().is_none_or(|room| device.rooms.contains(room))
            && self
                .function
                .as_ref()
                .is_none_or(|function| device.functions.contains(function))
    }

    fn matches_text(&self, node: &TreeNode) -> bool {
        let needle = self.text.trim().to_lowercase();
        needle.is_empty()
            || node.title.to_lowercase().contains(&needle)
            || node.id.to_lowercase().contains(&needle)
    }

    fn matches_leaf(&self, node: &TreeNode, devices: &[Device]) -> bool {
        let device = node.device_index.and_then(|i| devices.get(i));
        let criteria_ok = match device {
            Some(device) => self.matches_device(device),
            None => !self.has_device_criteria(),
        };
        criteria_ok && self.matches_text(node)
    }
}

/// Annotate `nodes` for `predicate`.
///
/// Folders start visible. While any dimension is active, folders without
/// visible children are hidden, repeatedly, until nothing changes.
pub fn apply_filter(nodes: &mut [TreeNode], devices: &[Device], predicate: &FilterPredicate) {
    let active = predicate.is_active();
    for node in nodes.iter_mut() {
        node.visible = node.is_folder() || predicate.matches_leaf(node, devices);
    }

    loop {
        let mut counts = vec![0usize; nodes.len()];
        for node in nodes.iter().filter(|n| n.visible) {
            if let Some(count) = node.parent_index.and_then(|p| counts.get_mut(p)) {
                *count += 1;
            }
        }

        let mut changed = false;
        for (node, count) in nodes.iter_mut().zip(counts) {
            node.has_visible_children_count = count;
            if active && node.is_folder() && node.visible && count == 0 {
                node.visible = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DisplayRecord, TreeOptions};
    use crate::tree::synthesize;
    use std::collections::HashMap;

    fn device(kind: DeviceKind, rooms: &[&str]) -> Device {
        Device {
            kind,
            states: Vec::new(),
            channel_id: String::new(),
            rooms: rooms.iter().map(|r| (*r).to_owned()).collect(),
            functions: Vec::new(),
            name: String::new(),
            icon: None,
            color: None,
        }
    }

    fn tree() -> Vec<TreeNode> {
        let records: HashMap<String, DisplayRecord> = [
            ("alias.0.kitchen.light", DisplayRecord::device("Ceiling light", 0)),
            ("alias.0.kitchen.sub.temp", DisplayRecord::device("Thermometer", 1)),
            ("alias.0.empty", DisplayRecord::folder("Empty")),
        ]
        .into_iter()
        .map(|(id, r)| (id.to_owned(), r))
        .collect();
        synthesize(&records, &TreeOptions::default()).unwrap_or_default()
    }

    fn devices() -> Vec<Device> {
        vec![
            device(DeviceKind::Light, &["enum.rooms.kitchen"]),
            device(DeviceKind::Temperature, &[]),
        ]
    }

    fn visible(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().filter(|n| n.visible).map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn inactive_filter_shows_empty_folders() {
        let mut nodes = tree();
        apply_filter(&mut nodes, &devices(), &FilterPredicate::default());
        assert_eq!(visible(&nodes).len(), nodes.len());
        let empty = nodes.iter().find(|n| n.id == "alias.0.empty");
        assert!(empty.is_some_and(|n| n.has_visible_children_count == 0));
    }

    #[test]
    fn text_filter_hides_folders_transitively() {
        let mut nodes = tree();
        apply_filter(&mut nodes, &devices(), &FilterPredicate::text("CEILING"));
        assert_eq!(visible(&nodes), ["alias.0.kitchen", "alias.0.kitchen.light"]);
        let kitchen = nodes.iter().find(|n| n.id == "alias.0.kitchen");
        assert!(kitchen.is_some_and(|n| n.has_visible_children_count == 1));
    }

    #[test]
    fn device_criteria_apply_to_device_nodes() {
        let mut nodes = tree();
        let predicate = FilterPredicate {
            device_kind: Some(DeviceKind::Temperature),
            ..FilterPredicate::default()
        };
        apply_filter(&mut nodes, &devices(), &predicate);
        assert_eq!(
            visible(&nodes),
            ["alias.0.kitchen", "alias.0.kitchen.sub", "alias.0.kitchen.sub.temp"]
        );

        let predicate = FilterPredicate {
            room: Some("enum.rooms.kitchen".into()),
            ..FilterPredicate::default()
        };
        apply_filter(&mut nodes, &devices(), &predicate);
        assert_eq!(visible(&nodes), ["alias.0.kitchen", "alias.0.kitchen.light"]);
    }

    #[test]
    fn filter_is_idempotent() {
        let predicate = FilterPredicate::text("thermo");
        let mut once = tree();
        apply_filter(&mut once, &devices(), &predicate);
        let mut twice = once.clone();
        apply_filter(&mut twice, &devices(), &predicate);
        assert_eq!(once, twice);
    }
}
