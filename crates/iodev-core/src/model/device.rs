// ── Device domain types ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Device type tag from the detector's closed vocabulary.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
#[non_exhaustive]
pub enum DeviceKind {
    Thermostat,
    Blind,
    Dimmer,
    Light,
    Socket,
    Window,
    Door,
    Motion,
    Temperature,
    Button,
}

/// One named sub-state of a detected device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSlot {
    /// Pattern name, e.g. `SET`, `ACTUAL`, `UNREACH`.
    pub name: String,
    /// Matched object id; `None` when no object fills the slot yet.
    pub id: Option<String>,
    pub required: bool,
    pub default_role: String,
    pub value_type: Option<String>,
    pub read: bool,
    pub write: bool,
    /// The slot accepts more than one object.
    pub multiple: bool,
    /// Status indicator (battery, reachability, ...) rather than a value.
    pub indicator: bool,
}

impl StateSlot {
    pub fn has_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Raw detector output: a typed bundle of states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMatch {
    pub kind: DeviceKind,
    pub states: Vec<StateSlot>,
}

impl DeviceMatch {
    /// First required slot that has an id.
    pub fn main_state_id(&self) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.required && s.has_id())
            .and_then(|s| s.id.as_deref())
    }
}

/// A detected device enriched with membership and presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub kind: DeviceKind,
    pub states: Vec<StateSlot>,
    /// Representative id: used for enum membership and as the display node.
    pub channel_id: String,
    /// Room enum ids listing `channel_id`.
    pub rooms: Vec<String>,
    /// Function enum ids listing `channel_id`.
    pub functions: Vec<String>,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl Device {
    /// All concrete state ids, in slot order.
    pub fn state_ids(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|s| s.has_id())
            .filter_map(|s| s.id.as_deref())
    }

    pub fn main_state_id(&self) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.required && s.has_id())
            .and_then(|s| s.id.as_deref())
    }

    /// The representative id is a state, not a container.
    pub fn is_single_state(&self) -> bool {
        self.main_state_id() == Some(self.channel_id.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_string_forms() {
        assert_eq!(DeviceKind::Light.to_string(), "light");
        assert_eq!(DeviceKind::from_str("thermostat").unwrap(), DeviceKind::Thermostat);
        assert_eq!(
            serde_json::to_value(DeviceKind::Dimmer).unwrap(),
            serde_json::json!("dimmer")
        );
    }
}
