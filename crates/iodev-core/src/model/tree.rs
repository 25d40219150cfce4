// ── Display tree types ──
//
// Synthesized, never persisted.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Folder,
    /// Backed by an entry of the device list.
    Device,
    /// A plain channel/device object no pattern matched.
    Object,
}

/// Caller-built input record for one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRecord {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub kind: NodeKind,
    pub nondeletable: bool,
    pub device_index: Option<usize>,
}

impl DisplayRecord {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            color: None,
            kind: NodeKind::Folder,
            nondeletable: false,
            device_index: None,
        }
    }

    pub fn device(name: impl Into<String>, device_index: usize) -> Self {
        Self {
            name: name.into(),
            icon: None,
            color: None,
            kind: NodeKind::Device,
            nondeletable: false,
            device_index: Some(device_index),
        }
    }
}

/// One row of the display tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    pub title: String,
    pub depth: usize,
    pub parent_id: Option<String>,
    pub kind: NodeKind,
    /// Position in the ordered node list.
    pub index: usize,
    pub parent_index: Option<usize>,
    pub visible: bool,
    pub has_visible_children_count: usize,
    pub device_index: Option<usize>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub nondeletable: bool,
    /// Invented for a missing intermediate path.
    pub synthesized: bool,
}

impl TreeNode {
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

/// Options for [`crate::tree::synthesize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    /// Only ids within this prefix are placed; titles become relative to it.
    pub root: Option<String>,
    /// Ids that sort after everything else, in this order.
    pub trailing_ids: Vec<String>,
    /// Namespace owning the reserved pseudo-folders.
    pub alias_namespace: String,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            root: None,
            trailing_ids: Vec::new(),
            alias_namespace: "alias.0".into(),
        }
    }
}
