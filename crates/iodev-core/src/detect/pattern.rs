// ── Built-in pattern detector ──
//
// Classifies the direct child states of a channel/device (or a single
// free-standing state) against the catalog. A root can host several
// devices: patterns are applied repeatedly to the states no earlier match
// consumed.

use tracing::trace;

use crate::model::{DeviceMatch, ManagedObject, ObjectKind, StateSlot};
use crate::namespace;

use super::catalog::{DevicePattern, pattern_catalog};
use super::{DetectRequest, Detector};

/// Catalog-driven [`Detector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternDetector;

impl PatternDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Detector for PatternDetector {
    fn detect(&self, request: &DetectRequest<'_>) -> Option<Vec<DeviceMatch>> {
        let root = request.snapshot.get(request.root_id)?;

        let candidates: Vec<&ManagedObject> = match &root.kind {
            ObjectKind::Channel | ObjectKind::Device => child_states(request),
            ObjectKind::State(_) => {
                // A state inside a channel belongs to the channel's device.
                let parent = request.snapshot.get(namespace::parent_id(&root.id));
                if parent.is_some_and(|p| matches!(p.kind, ObjectKind::Channel | ObjectKind::Device)) {
                    return None;
                }
                vec![root]
            }
            _ => return None,
        };

        let mut used = vec![false; candidates.len()];
        let mut matches = Vec::new();
        while let Some((found, consumed)) = pattern_catalog()
            .iter()
            .find_map(|pattern| try_pattern(pattern, &candidates, &used))
        {
            trace!(root = request.root_id, kind = %found.kind, "pattern matched");
            for index in consumed {
                if let Some(flag) = used.get_mut(index) {
                    *flag = true;
                }
            }
            matches.push(found);
        }
        if root.state().is_some() {
            // A free-standing state is the whole device.
            for found in &mut matches {
                found.states.retain(StateSlot::has_id);
            }
        }
        Some(matches)
    }

    fn pattern_catalog(&self) -> &'static [DevicePattern] {
        pattern_catalog()
    }
}

/// Direct child states of the request root, via the sorted key index.
fn child_states<'a>(request: &DetectRequest<'a>) -> Vec<&'a ManagedObject> {
    let prefix = format!("{}.", request.root_id);
    let keys = request.sorted_keys;
    let start = keys.partition_point(|k| k.as_str() < prefix.as_str());
    keys.get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|k| k.starts_with(&prefix))
        .filter(|k| !k[prefix.len()..].contains('.'))
        .filter_map(|k| request.snapshot.get(k))
        .filter(|o| o.state().is_some())
        .collect()
}

/// Fill `pattern` from the unused candidates. Returns the match and the
/// candidate indexes it consumed, or `None` if a required slot is empty.
fn try_pattern(
    pattern: &DevicePattern,
    candidates: &[&ManagedObject],
    used: &[bool],
) -> Option<(DeviceMatch, Vec<usize>)> {
    let mut consumed: Vec<usize> = Vec::new();
    let mut slots: Vec<StateSlot> = Vec::new();

    for state_pattern in pattern.states {
        let available: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                !used.get(*i).copied().unwrap_or(true)
                    && !consumed.contains(i)
                    && state_pattern.matches(c)
            })
            .map(|(i, _)| i)
            .collect();

        let picked: &[usize] = if state_pattern.multiple {
            &available
        } else {
            available.get(..1).unwrap_or_default()
        };

        if picked.is_empty() {
            if state_pattern.required {
                return None;
            }
            // Dangling slot: reported so the object can be created later.
            slots.push(state_pattern.slot(None));
            continue;
        }
        for &index in picked {
            let id = candidates.get(index).map(|c| c.id.clone());
            slots.push(state_pattern.slot(id));
            consumed.push(index);
        }
    }

    Some((
        DeviceMatch {
            kind: pattern.kind,
            states: slots,
        },
        consumed,
    ))
}
