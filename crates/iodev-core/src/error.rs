// ── Core error types ──
//
// User-facing errors from iodev-core. Store failures arrive as
// `iodev_api::Error` and are translated by the `From` impl below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Store errors ─────────────────────────────────────────────────
    #[error("Object store error: {message}")]
    Store {
        message: String,
        /// Object the failing call was about, if known.
        id: Option<String>,
    },

    #[error("Object not found: {id}")]
    ObjectNotFound { id: String },

    #[error("Malformed object {id}: {message}")]
    MalformedObject { id: String, message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    /// The detector produced a device no membership can attach to.
    #[error("Device of type {kind} has no required state with an id")]
    DetectorInvariant { kind: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Another structural change is in progress")]
    Busy,

    #[error("Tree build failed: missing parents unresolved after {passes} passes")]
    TreeBuildFailed { passes: usize },

    #[error("Reconciler is not running")]
    ReconcilerStopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

// ── Conversion from store errors ─────────────────────────────────────

impl From<iodev_api::Error> for CoreError {
    fn from(err: iodev_api::Error) -> Self {
        match err {
            iodev_api::Error::NotFound { id } => CoreError::ObjectNotFound { id },
            iodev_api::Error::Malformed { id, message } => {
                CoreError::MalformedObject { id, message }
            }
            iodev_api::Error::SubscriptionClosed => CoreError::ReconcilerStopped,
            other => CoreError::Store {
                message: other.to_string(),
                id: other.object_id().map(str::to_owned),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_keep_object_id() {
        let err: CoreError = iodev_api::Error::Rejected {
            id: "alias.0.x".into(),
            reason: "acl".into(),
        }
        .into();
        match err {
            CoreError::Store { id, message } => {
                assert_eq!(id.as_deref(), Some("alias.0.x"));
                assert!(message.contains("acl"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn not_found_maps_to_object_not_found() {
        let err: CoreError = iodev_api::Error::NotFound { id: "a.0.b".into() }.into();
        assert!(matches!(err, CoreError::ObjectNotFound { id } if id == "a.0.b"));
    }
}
