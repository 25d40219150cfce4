// ── Tree synthesizer ──
//
// Turns a flat id → record map into an ordered display tree. Missing
// intermediate folders are invented with a bounded worklist; the final
// order is a pre-order walk over siblings sorted by placement rank and
// case-insensitive title.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DisplayRecord, NodeKind, TreeNode, TreeOptions};
use crate::namespace;

/// Segment count of the namespace prefix (`alias.0`) when no root is given.
const NAMESPACE_PREFIX_SEGMENTS: usize = 2;

/// Build the display tree for `records`.
pub fn synthesize(
    records: &HashMap<String, DisplayRecord>,
    options: &TreeOptions,
) -> Result<Vec<TreeNode>, CoreError> {
    let layout = Layout::new(options);
    let max_depth = records
        .keys()
        .filter(|id| layout.in_scope(id))
        .map(|id| namespace::segment_count(id).saturating_sub(layout.base))
        .max()
        .unwrap_or(0);
    synthesize_bounded(records, options, max_depth + 2)
}

/// [`synthesize`] with an explicit cap on missing-parent passes.
pub fn synthesize_bounded(
    records: &HashMap<String, DisplayRecord>,
    options: &TreeOptions,
    pass_limit: usize,
) -> Result<Vec<TreeNode>, CoreError> {
    let layout = Layout::new(options);

    // ── Seed nodes from records ──
    let mut nodes: HashMap<String, TreeNode> = records
        .iter()
        .filter(|(id, _)| layout.in_scope(id))
        .map(|(id, record)| (id.clone(), layout.node_from_record(id, record)))
        .collect();

    // ── Synthesize missing parents ──
    let mut pending: BTreeSet<String> = nodes
        .values()
        .filter_map(|n| n.parent_id.clone())
        .filter(|p| !nodes.contains_key(p))
        .collect();
    let mut passes = 0;
    while !pending.is_empty() {
        passes += 1;
        if passes > pass_limit {
            warn!(pass_limit, unresolved = pending.len(), "missing-parent synthesis did not converge");
            return Err(CoreError::TreeBuildFailed { passes: pass_limit });
        }
        let mut next = BTreeSet::new();
        for id in pending {
            if nodes.contains_key(&id) {
                continue;
            }
            let node = layout.synthesized_folder(&id);
            if let Some(parent) = &node.parent_id {
                if !nodes.contains_key(parent) {
                    next.insert(parent.clone());
                }
            }
            nodes.insert(id, node);
        }
        pending = next;
    }

    // ── Order: sorted siblings, pre-order walk ──
    let mut children: HashMap<Option<String>, Vec<String>> = HashMap::new();
    for node in nodes.values() {
        children
            .entry(node.parent_id.clone())
            .or_default()
            .push(node.id.clone());
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| layout.compare(&nodes, a, b));
    }

    let mut ordered: Vec<TreeNode> = Vec::with_capacity(nodes.len());
    let mut stack: Vec<String> = children
        .get(&None)
        .map(|roots| roots.iter().rev().cloned().collect())
        .unwrap_or_default();
    while let Some(id) = stack.pop() {
        if let Some(kids) = children.get(&Some(id.clone())) {
            stack.extend(kids.iter().rev().cloned());
        }
        if let Some(node) = nodes.remove(&id) {
            ordered.push(node);
        }
    }

    // ── Index assignment ──
    let positions: HashMap<String, usize> = ordered
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();
    for (index, node) in ordered.iter_mut().enumerate() {
        node.index = index;
        node.parent_index = node.parent_id.as_ref().and_then(|p| positions.get(p).copied());
        node.has_visible_children_count = children
            .get(&Some(node.id.clone()))
            .map_or(0, Vec::len);
    }

    debug!(nodes = ordered.len(), passes, "tree synthesized");
    Ok(ordered)
}

// ── Placement policy ─────────────────────────────────────────────────

struct Layout<'a> {
    root: Option<&'a str>,
    base: usize,
    trailing: &'a [String],
    alias_namespace: &'a str,
}

impl<'a> Layout<'a> {
    fn new(options: &'a TreeOptions) -> Self {
        let root = options.root.as_deref().filter(|r| !r.is_empty());
        Self {
            root,
            base: root.map_or(NAMESPACE_PREFIX_SEGMENTS, namespace::segment_count),
            trailing: &options.trailing_ids,
            alias_namespace: &options.alias_namespace,
        }
    }

    fn in_scope(&self, id: &str) -> bool {
        match self.root {
            Some(root) => namespace::is_below(id, root),
            None => namespace::segment_count(id) > self.base,
        }
    }

    /// Parent node id, or `None` at the top of the scope.
    fn parent_of(&self, id: &str) -> Option<String> {
        let parent = namespace::parent_id(id);
        (namespace::segment_count(parent) > self.base).then(|| parent.to_owned())
    }

    fn depth_of(&self, parent: Option<&str>) -> usize {
        parent.map_or(0, |p| namespace::segment_count(p).saturating_sub(self.base))
    }

    fn node_from_record(&self, id: &str, record: &DisplayRecord) -> TreeNode {
        let parent_id = self.parent_of(id);
        let title = if record.name.trim().is_empty() {
            self.fallback_title(id)
        } else {
            record.name.clone()
        };
        TreeNode {
            id: id.to_owned(),
            title,
            depth: self.depth_of(parent_id.as_deref()),
            parent_id,
            kind: record.kind,
            index: 0,
            parent_index: None,
            visible: true,
            has_visible_children_count: 0,
            device_index: record.device_index,
            icon: record.icon.clone(),
            color: record.color.clone(),
            nondeletable: record.nondeletable,
            synthesized: false,
        }
    }

    fn synthesized_folder(&self, id: &str) -> TreeNode {
        let parent_id = self.parent_of(id);
        TreeNode {
            id: id.to_owned(),
            title: self.fallback_title(id),
            depth: self.depth_of(parent_id.as_deref()),
            parent_id,
            kind: NodeKind::Folder,
            index: 0,
            parent_index: None,
            visible: true,
            has_visible_children_count: 0,
            device_index: None,
            icon: None,
            color: None,
            nondeletable: namespace::is_in_reserved_folder(id, self.alias_namespace),
            synthesized: true,
        }
    }

    fn fallback_title(&self, id: &str) -> String {
        match self.root {
            Some(root) => namespace::relative_to(id, root).to_owned(),
            None => namespace::last_segment(id).to_owned(),
        }
    }

    /// 0: parentless non-folders, 1: everything else, 2: reserved
    /// pseudo-folders, 3: configured trailing ids.
    fn rank(&self, node: &TreeNode) -> (u8, usize) {
        if let Some(pos) = self.trailing.iter().position(|t| *t == node.id) {
            return (3, pos);
        }
        if namespace::is_reserved_folder(&node.id, self.alias_namespace) {
            return (2, 0);
        }
        if node.parent_id.is_none() && !node.is_folder() {
            return (0, 0);
        }
        (1, 0)
    }

    fn compare(&self, nodes: &HashMap<String, TreeNode>, a: &str, b: &str) -> Ordering {
        let (Some(na), Some(nb)) = (nodes.get(a), nodes.get(b)) else {
            return a.cmp(b);
        };
        self.rank(na)
            .cmp(&self.rank(nb))
            .then_with(|| na.title.to_lowercase().cmp(&nb.title.to_lowercase()))
            .then_with(|| a.cmp(b))
    }
}
