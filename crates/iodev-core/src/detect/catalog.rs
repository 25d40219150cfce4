// ── Device pattern catalog ──
//
// Static description of every device type the built-in detector knows:
// its named sub-states, which are required, and how a state qualifies.
// Patterns are tried in catalog order, so more specific types come first.

use crate::model::{DeviceKind, ManagedObject, StateSlot};
use crate::namespace;

/// How a state's `common.role` must look to fill a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRule {
    Exact(&'static str),
    /// The role or any dotted refinement of it (`button` ⊇ `button.press`).
    Prefix(&'static str),
    OneOf(&'static [&'static str]),
}

impl RoleRule {
    pub fn matches(self, role: &str) -> bool {
        match self {
            Self::Exact(expected) => role == expected,
            Self::Prefix(prefix) => namespace::is_within(role, prefix),
            Self::OneOf(options) => options.contains(&role),
        }
    }
}

/// One named sub-state of a device pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatePattern {
    pub name: &'static str,
    pub role: RoleRule,
    pub required: bool,
    pub default_role: &'static str,
    pub value_type: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub read: bool,
    pub write: bool,
    pub multiple: bool,
    pub indicator: bool,
}

impl StatePattern {
    const fn new(name: &'static str, role: RoleRule, default_role: &'static str) -> Self {
        Self {
            name,
            role,
            required: false,
            default_role,
            value_type: None,
            unit: None,
            read: true,
            write: false,
            multiple: false,
            indicator: false,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn typed(mut self, value_type: &'static str) -> Self {
        self.value_type = Some(value_type);
        self
    }

    const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    const fn writable(mut self) -> Self {
        self.write = true;
        self
    }

    const fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    const fn indicator(name: &'static str, role: &'static str) -> Self {
        let mut pattern = Self::new(name, RoleRule::Exact(role), role).typed("boolean");
        pattern.indicator = true;
        pattern
    }

    /// `true` if `object` is a state that can fill this slot.
    ///
    /// Role-less states qualify by id suffix and value type, so a bare
    /// boolean `…light.SET` still reads as a light switch.
    pub fn matches(&self, object: &ManagedObject) -> bool {
        let Some(state) = object.state() else {
            return false;
        };
        let type_ok = match (self.value_type, state.value_type.as_deref()) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => true,
        };
        match object.role() {
            Some(role) if !role.is_empty() => type_ok && self.role.matches(role),
            _ => {
                self.value_type.is_some()
                    && state.value_type.is_some()
                    && type_ok
                    && namespace::last_segment(&object.id) == self.name
            }
        }
    }

    /// An output slot for this pattern, filled with `id`.
    pub fn slot(&self, id: Option<String>) -> StateSlot {
        StateSlot {
            name: self.name.to_owned(),
            id,
            required: self.required,
            default_role: self.default_role.to_owned(),
            value_type: self.value_type.map(str::to_owned),
            read: self.read,
            write: self.write,
            multiple: self.multiple,
            indicator: self.indicator,
        }
    }
}

/// All sub-states of one device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePattern {
    pub kind: DeviceKind,
    pub states: &'static [StatePattern],
}

const UNREACH: StatePattern = StatePattern::indicator("UNREACH", "indicator.maintenance.unreach");
const LOWBAT: StatePattern = StatePattern::indicator("LOWBAT", "indicator.maintenance.lowbat");
const WORKING: StatePattern = StatePattern::indicator("WORKING", "indicator.working");

static CATALOG: &[DevicePattern] = &[
    DevicePattern {
        kind: DeviceKind::Thermostat,
        states: &[
            StatePattern::new("SET", RoleRule::Exact("level.temperature"), "level.temperature")
                .required()
                .typed("number")
                .unit("°C")
                .writable(),
            StatePattern::new("ACTUAL", RoleRule::Exact("value.temperature"), "value.temperature")
                .typed("number")
                .unit("°C"),
            StatePattern::new("HUMIDITY", RoleRule::Exact("value.humidity"), "value.humidity")
                .typed("number")
                .unit("%"),
            StatePattern::new("BOOST", RoleRule::Exact("switch.mode.boost"), "switch.mode.boost")
                .typed("boolean")
                .writable(),
            UNREACH,
            LOWBAT,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Blind,
        states: &[
            StatePattern::new("SET", RoleRule::Exact("level.blind"), "level.blind")
                .required()
                .typed("number")
                .unit("%")
                .writable(),
            StatePattern::new("ACTUAL", RoleRule::Exact("value.blind"), "value.blind")
                .typed("number")
                .unit("%"),
            StatePattern::new("STOP", RoleRule::Exact("button.stop"), "button.stop")
                .typed("boolean")
                .writable(),
            UNREACH,
            LOWBAT,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Dimmer,
        states: &[
            StatePattern::new("SET", RoleRule::Exact("level.dimmer"), "level.dimmer")
                .required()
                .typed("number")
                .unit("%")
                .writable(),
            StatePattern::new("ACTUAL", RoleRule::Exact("value.dimmer"), "value.dimmer")
                .typed("number")
                .unit("%"),
            StatePattern::new("ON_SET", RoleRule::Exact("switch.light"), "switch.light")
                .typed("boolean")
                .writable(),
            UNREACH,
            LOWBAT,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Light,
        states: &[
            StatePattern::new("SET", RoleRule::Exact("switch.light"), "switch.light")
                .required()
                .typed("boolean")
                .writable(),
            StatePattern::new("ON_ACTUAL", RoleRule::Exact("sensor.light"), "sensor.light")
                .typed("boolean"),
            UNREACH,
            LOWBAT,
            WORKING,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Socket,
        states: &[
            StatePattern::new("SET", RoleRule::OneOf(&["switch", "switch.power"]), "switch")
                .required()
                .typed("boolean")
                .writable(),
            StatePattern::new("ACTUAL", RoleRule::Exact("sensor.switch"), "sensor.switch")
                .typed("boolean"),
            StatePattern::new("ELECTRIC_POWER", RoleRule::Exact("value.power"), "value.power")
                .typed("number")
                .unit("W"),
            UNREACH,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Window,
        states: &[
            StatePattern::new("ACTUAL", RoleRule::Exact("sensor.window"), "sensor.window")
                .required()
                .typed("boolean"),
            UNREACH,
            LOWBAT,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Door,
        states: &[
            StatePattern::new("ACTUAL", RoleRule::Exact("sensor.door"), "sensor.door")
                .required()
                .typed("boolean"),
            UNREACH,
            LOWBAT,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Motion,
        states: &[
            StatePattern::new("ACTUAL", RoleRule::Exact("sensor.motion"), "sensor.motion")
                .required()
                .typed("boolean"),
            StatePattern::new("SECOND", RoleRule::Exact("value.brightness"), "value.brightness")
                .typed("number")
                .unit("lux"),
            UNREACH,
            LOWBAT,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Temperature,
        states: &[
            StatePattern::new("ACTUAL", RoleRule::Exact("value.temperature"), "value.temperature")
                .required()
                .typed("number")
                .unit("°C"),
            StatePattern::new("SECOND", RoleRule::Exact("value.humidity"), "value.humidity")
                .typed("number")
                .unit("%"),
            UNREACH,
            LOWBAT,
        ],
    },
    DevicePattern {
        kind: DeviceKind::Button,
        states: &[
            StatePattern::new("SET", RoleRule::OneOf(&["button", "button.press"]), "button")
                .required()
                .typed("boolean")
                .writable(),
            StatePattern::new("PRESS_LONG", RoleRule::Exact("button.long"), "button.long")
                .typed("boolean")
                .writable()
                .multiple(),
            UNREACH,
            LOWBAT,
        ],
    },
];

/// Every known device type, in detection priority order.
pub fn pattern_catalog() -> &'static [DevicePattern] {
    CATALOG
}

/// Catalog entry for `kind`.
pub fn pattern_for(kind: DeviceKind) -> Option<&'static DevicePattern> {
    CATALOG.iter().find(|p| p.kind == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Common, ObjectKind, StateCommon};

    fn state(id: &str, role: Option<&str>, value_type: &str) -> ManagedObject {
        let mut common = Common::named("x");
        common.role = role.map(str::to_owned);
        ManagedObject::new(
            id,
            ObjectKind::State(StateCommon {
                value_type: Some(value_type.to_owned()),
                ..StateCommon::default()
            }),
            common,
        )
    }

    #[test]
    fn every_pattern_has_a_required_state() {
        for pattern in pattern_catalog() {
            assert!(
                pattern.states.iter().any(|s| s.required),
                "{} has no required state",
                pattern.kind
            );
        }
    }

    #[test]
    fn role_rules() {
        assert!(RoleRule::Prefix("button").matches("button.long"));
        assert!(!RoleRule::Prefix("button").matches("buttons"));
        assert!(RoleRule::OneOf(&["switch", "switch.power"]).matches("switch.power"));
        assert!(!RoleRule::Exact("switch").matches("switch.light"));
    }

    #[test]
    fn role_less_state_matches_by_name_and_type() {
        let light = pattern_for(DeviceKind::Light).map(|p| p.states[0]);
        let light = light.as_ref();
        assert!(light.is_some_and(|p| p.matches(&state("alias.0.k.l.SET", None, "boolean"))));
        assert!(!light.is_some_and(|p| p.matches(&state("alias.0.k.l.SET", None, "number"))));
        assert!(!light.is_some_and(|p| p.matches(&state("alias.0.k.l.ON", None, "boolean"))));
    }

    #[test]
    fn type_mismatch_blocks_role_match() {
        let dimmer = pattern_for(DeviceKind::Dimmer).map(|p| p.states[0]);
        assert!(dimmer.is_some_and(|p| p.matches(&state("a.0.d.SET", Some("level.dimmer"), "number"))));
        assert!(!dimmer.is_some_and(|p| p.matches(&state("a.0.d.SET", Some("level.dimmer"), "string"))));
    }
}
