// ── Runtime configuration ──
//
// Describes which namespaces the core manages and how it presents them.
// Never touches disk: `iodev-config` (or an embedder) builds a
// `CoreConfig` and hands it in.

use std::time::Duration;

/// Where smart names are stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SmartNameMode {
    /// `common.smartName`.
    #[default]
    Common,
    /// `common.custom[<integration_id>].smartName`, for integrations that
    /// must not touch `common`.
    Custom { integration_id: String },
}

/// Configuration for one `DeviceManager`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Language used to resolve localized names.
    pub language: String,
    /// Quiet period after the last change before recomputing.
    pub debounce: Duration,
    /// User-editable alias namespace, e.g. `alias.0`.
    pub alias_namespace: String,
    /// Companion integration namespace, e.g. `linkeddevices.0`.
    pub linked_namespace: String,
    pub smart_name_mode: SmartNameMode,
    /// Also list devices detected outside the editable namespaces.
    pub detect_foreign: bool,
    /// Ids sorted after everything else in the tree, in this order.
    pub trailing_ids: Vec<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            language: "en".into(),
            debounce: Duration::from_millis(400),
            alias_namespace: "alias.0".into(),
            linked_namespace: "linkeddevices.0".into(),
            smart_name_mode: SmartNameMode::Common,
            detect_foreign: true,
            trailing_ids: Vec::new(),
        }
    }
}

impl CoreConfig {
    /// Adapter name of the linked namespace (`linkeddevices`).
    pub fn linked_adapter(&self) -> &str {
        self.linked_namespace
            .split_once('.')
            .map_or(self.linked_namespace.as_str(), |(adapter, _)| adapter)
    }
}
