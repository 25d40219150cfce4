// ── Smart names ──
//
// Override names used by voice-assistant integrations. Stored as a
// per-language map, the literal `false` ("hidden from the integration"),
// or absent ("use the regular name").

use serde_json::{Map, Value};

use crate::config::SmartNameMode;
use crate::model::Common;

const SMART_NAME_KEY: &str = "smartName";

/// Smart name of an object for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmartName {
    /// No override; the integration uses the regular name.
    Default,
    /// Explicitly excluded from the integration (all languages).
    Hidden,
    Custom(String),
}

/// Read the smart name for `lang`.
pub fn get(common: &Common, lang: &str, mode: &SmartNameMode) -> SmartName {
    let stored = match mode {
        SmartNameMode::Common => common.smart_name.as_ref(),
        SmartNameMode::Custom { integration_id } => common
            .custom
            .as_ref()
            .and_then(|c| c.get(integration_id))
            .and_then(|entry| entry.get(SMART_NAME_KEY)),
    };
    match stored {
        Some(Value::Bool(false)) => SmartName::Hidden,
        Some(Value::String(text)) if !text.is_empty() => SmartName::Custom(text.clone()),
        Some(Value::Object(map)) => match map.get(lang) {
            Some(Value::String(text)) if !text.is_empty() => SmartName::Custom(text.clone()),
            _ => SmartName::Default,
        },
        _ => SmartName::Default,
    }
}

/// Write the smart name for `lang`. Returns `true` if `common` changed.
///
/// Clearing the last language removes the key, and in custom mode an
/// emptied integration entry is removed as well.
pub fn set(common: &mut Common, lang: &str, value: &SmartName, mode: &SmartNameMode) -> bool {
    match mode {
        SmartNameMode::Common => {
            let next = apply(common.smart_name.take(), lang, value);
            let changed = next != common.smart_name;
            common.smart_name = next;
            changed
        }
        SmartNameMode::Custom { integration_id } => {
            let before = common.custom.clone();
            let mut custom = common.custom.take().unwrap_or_default();
            let mut entry = match custom.remove(integration_id) {
                Some(Value::Object(entry)) => entry,
                _ => Map::new(),
            };
            if let Some(next) = apply(entry.remove(SMART_NAME_KEY), lang, value) {
                entry.insert(SMART_NAME_KEY.to_owned(), next);
            }
            if !entry.is_empty() {
                custom.insert(integration_id.clone(), Value::Object(entry));
            }
            common.custom = (!custom.is_empty()).then_some(custom);
            common.custom != before
        }
    }
}

/// New stored value after setting `lang` to `value`; `None` removes it.
fn apply(current: Option<Value>, lang: &str, value: &SmartName) -> Option<Value> {
    match value {
        SmartName::Hidden => Some(Value::Bool(false)),
        SmartName::Custom(text) if !text.is_empty() => {
            let mut map = match current {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            map.insert(lang.to_owned(), Value::String(text.clone()));
            Some(Value::Object(map))
        }
        SmartName::Custom(_) | SmartName::Default => match current {
            Some(Value::Object(mut map)) => {
                map.remove(lang);
                (!map.is_empty()).then_some(Value::Object(map))
            }
            _ => None,
        },
    }
}
