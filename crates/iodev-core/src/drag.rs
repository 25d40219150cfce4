// ── Drag and drop ──
//
// Idle → Dragging → Dropped(valid | invalid) | Cancelled.
//
// Hover checks only drive the visual affordance. The drop runs the same
// check again against whatever view is current at that moment, and the
// resulting plan is what the manager executes.

use tracing::debug;

use crate::error::CoreError;
use crate::model::Device;
use crate::mutation::plan;
use crate::namespace;
use crate::view::{Scope, ViewState};

/// A validated move, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPlan {
    /// Representative id of the dragged device.
    pub source: String,
    /// Container id the copy is written to.
    pub destination: String,
    /// The source is editable and is removed after the copy.
    pub delete_source: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Valid(DropPlan),
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        source: String,
        /// Last hovered target and whether it looked droppable.
        hover: Option<(Option<String>, bool)>,
    },
    Dropped(DropOutcome),
    Cancelled,
}

// ── Validation ───────────────────────────────────────────────────────

/// Checks drop targets against one view.
pub struct DropValidator<'a> {
    view: &'a ViewState,
    scope: Scope<'a>,
}

impl<'a> DropValidator<'a> {
    pub fn new(view: &'a ViewState, scope: Scope<'a>) -> Self {
        Self { view, scope }
    }

    /// Find the device behind a representative id or a device node id.
    pub fn device(&self, dragged: &str) -> Option<&'a Device> {
        let by_node = self
            .view
            .node(dragged)
            .and_then(|n| n.device_index)
            .and_then(|i| self.view.device(i));
        by_node.or_else(|| {
            self.view
                .device_index_of(dragged)
                .and_then(|i| self.view.device(i))
        })
    }

    /// Validate dropping `dragged` on `target`. `None` is the namespace root.
    pub fn check(&self, dragged: &str, target: Option<&str>) -> Result<DropPlan, CoreError> {
        let device = self.device(dragged).ok_or_else(|| CoreError::DeviceNotFound {
            identifier: dragged.to_owned(),
        })?;
        let alias = self.scope.config.alias_namespace.as_str();
        let target = target.unwrap_or(alias);

        if namespace::is_in_reserved_folder(target, alias) {
            return Err(CoreError::validation(format!("{target} is read-only")));
        }
        if target != alias && !self.scope.is_editable(target) {
            return Err(CoreError::validation(format!("{target} is not editable")));
        }
        if self
            .view
            .snapshot
            .get(target)
            .is_some_and(|o| !o.is_folder())
        {
            return Err(CoreError::validation(format!("{target} is not a folder")));
        }
        if namespace::is_within(target, &device.channel_id) {
            return Err(CoreError::validation("cannot drop a device into itself"));
        }

        let source_editable = self.scope.is_editable(&device.channel_id);
        let segment = if source_editable {
            namespace::last_segment(&device.channel_id).to_owned()
        } else {
            namespace::sanitize_segment(&device.name)
        };
        let destination = namespace::join(target, &segment);
        plan::validate_destination(&destination, &self.view.snapshot, self.scope)?;

        Ok(DropPlan {
            source: device.channel_id.clone(),
            destination,
            delete_source: source_editable,
        })
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// One drag gesture.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    state: DragState,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// Begin dragging. A finished gesture may be restarted.
    pub fn start(&mut self, source: impl Into<String>) -> Result<(), CoreError> {
        if matches!(self.state, DragState::Dragging { .. }) {
            return Err(CoreError::validation("a drag is already in progress"));
        }
        self.state = DragState::Dragging {
            source: source.into(),
            hover: None,
        };
        Ok(())
    }

    /// Advisory check while hovering. `false` when not dragging.
    pub fn hover(&mut self, target: Option<&str>, validator: &DropValidator<'_>) -> bool {
        let DragState::Dragging { source, hover } = &mut self.state else {
            return false;
        };
        let droppable = validator.check(source, target).is_ok();
        *hover = Some((target.map(str::to_owned), droppable));
        droppable
    }

    /// Drop on `target`, re-validating against `validator`.
    pub fn drop_on(&mut self, target: Option<&str>, validator: &DropValidator<'_>) -> DropOutcome {
        let outcome = match &self.state {
            DragState::Dragging { source, .. } => match validator.check(source, target) {
                Ok(plan) => DropOutcome::Valid(plan),
                Err(e) => DropOutcome::Invalid {
                    reason: e.to_string(),
                },
            },
            _ => DropOutcome::Invalid {
                reason: "no drag in progress".into(),
            },
        };
        debug!(?outcome, "drop");
        self.state = DragState::Dropped(outcome.clone());
        outcome
    }

    pub fn cancel(&mut self) {
        if matches!(self.state, DragState::Dragging { .. }) {
            self.state = DragState::Cancelled;
        }
    }

    /// The validated plan of a successful drop, consuming it.
    pub fn take_plan(&mut self) -> Option<DropPlan> {
        match std::mem::take(&mut self.state) {
            DragState::Dropped(DropOutcome::Valid(plan)) => Some(plan),
            other => {
                self.state = other;
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::detect::DetectorAdapter;
    use crate::filter::FilterPredicate;
    use crate::model::{Common, ManagedObject, ObjectKind, StateCommon};
    use crate::store::NamespaceSnapshot;
    use crate::view;
    use std::sync::Arc;

    fn view_of(objects: Vec<ManagedObject>, config: &CoreConfig) -> ViewState {
        let snapshot = NamespaceSnapshot::from_objects(objects);
        let computed = view::compute(
            &DetectorAdapter::builtin(),
            &snapshot,
            Scope::new(config, false),
            &FilterPredicate::default(),
        )
        .unwrap();
        ViewState {
            snapshot,
            devices: Arc::new(computed.devices),
            nodes: Arc::new(computed.nodes),
            ..ViewState::default()
        }
    }

    fn light(channel: &str) -> Vec<ManagedObject> {
        let mut common = Common::named("SET");
        common.role = Some("switch.light".into());
        vec![
            ManagedObject::new(channel, ObjectKind::Channel, Common::named("Light")),
            ManagedObject::new(
                format!("{channel}.SET"),
                ObjectKind::State(StateCommon {
                    value_type: Some("boolean".into()),
                    ..StateCommon::default()
                }),
                common,
            ),
        ]
    }

    #[test]
    fn hover_is_advisory_and_drop_revalidates() {
        let config = CoreConfig::default();
        let mut objects = light("alias.0.kitchen.light");
        objects.push(ManagedObject::folder("alias.0.living", "Living"));
        let before = view_of(objects.clone(), &config);

        let mut session = DragSession::new();
        session.start("alias.0.kitchen.light").unwrap();
        let validator = DropValidator::new(&before, Scope::new(&config, false));
        assert!(session.hover(Some("alias.0.living"), &validator));
        assert!(!session.hover(Some("alias.0.automatically_detected"), &validator));

        // Someone else created the destination in the meantime.
        objects.push(ManagedObject::folder("alias.0.living.light", "Taken"));
        let after = view_of(objects, &config);
        let validator = DropValidator::new(&after, Scope::new(&config, false));
        let outcome = session.drop_on(Some("alias.0.living"), &validator);
        assert!(matches!(outcome, DropOutcome::Invalid { .. }));
        assert!(session.take_plan().is_none());
    }

    #[test]
    fn drop_without_target_moves_to_root() {
        let config = CoreConfig::default();
        let view = view_of(light("alias.0.kitchen.light"), &config);
        let validator = DropValidator::new(&view, Scope::new(&config, false));

        let mut session = DragSession::new();
        session.start("alias.0.kitchen.light").unwrap();
        session.drop_on(None, &validator);
        let plan = session.take_plan().unwrap();
        assert_eq!(plan.destination, "alias.0.light");
        assert!(plan.delete_source);
        assert_eq!(session.state(), &DragState::Idle);
    }

    #[test]
    fn cancel_only_applies_while_dragging() {
        let mut session = DragSession::new();
        session.cancel();
        assert_eq!(session.state(), &DragState::Idle);
        session.start("x").unwrap();
        assert!(session.start("y").is_err());
        session.cancel();
        assert_eq!(session.state(), &DragState::Cancelled);
    }
}
