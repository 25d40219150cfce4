use thiserror::Error;

/// Top-level error type for the `iodev-api` crate.
///
/// Every failure a backing store can report: missing objects, rejected
/// writes, and transport-level unavailability. `iodev-core` maps these into
/// its own user-facing error type.
#[derive(Debug, Error)]
pub enum Error {
    // ── Lookup ──────────────────────────────────────────────────────
    /// The requested object does not exist.
    #[error("Object not found: {id}")]
    NotFound { id: String },

    // ── Writes ──────────────────────────────────────────────────────
    /// The store refused the write (ACL, validation, read-only namespace).
    #[error("Write to {id} rejected: {reason}")]
    Rejected { id: String, reason: String },

    /// The current user may not touch this object.
    #[error("Permission denied for {id}")]
    PermissionDenied { id: String },

    // ── Transport ───────────────────────────────────────────────────
    /// The store could not be reached (socket closed, host down).
    #[error("Object store unavailable: {0}")]
    Unavailable(String),

    /// Request did not complete in time.
    #[error("Object store request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// A record could not be (de)serialized.
    #[error("Malformed object {id}: {message}")]
    Malformed { id: String, message: String },

    /// The change-notification stream has ended.
    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl Error {
    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a later attempt (e.g. a manual refresh) might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }

    /// The object id the error refers to, if any.
    pub fn object_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { id }
            | Self::Rejected { id, .. }
            | Self::PermissionDenied { id }
            | Self::Malformed { id, .. } => Some(id),
            Self::Unavailable(_) | Self::Timeout { .. } | Self::SubscriptionClosed => None,
        }
    }
}
