// ── Mutation outcome types ──

use serde::Serialize;
use strum::Display;

/// Lifecycle of one multi-step mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum MutationState {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    PartiallyFailed,
}

impl MutationState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::PartiallyFailed)
    }
}

/// The store call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum StepKind {
    ReadObject,
    WriteObject,
    DeleteObject,
    AddMembership,
    RemoveMembership,
}

/// A non-fatal failure of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub id: String,
    pub step: StepKind,
    pub message: String,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.step, self.id, self.message)
    }
}

/// Aggregate result of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MutationReport {
    pub state: MutationState,
    /// Ids written, in order.
    pub written: Vec<String>,
    /// Ids deleted, in order.
    pub deleted: Vec<String>,
    pub failures: Vec<StepFailure>,
}

impl MutationReport {
    pub fn started() -> Self {
        Self {
            state: MutationState::InProgress,
            ..Self::default()
        }
    }

    pub fn fail(&mut self, id: impl Into<String>, step: StepKind, message: &dyn std::fmt::Display) {
        self.failures.push(StepFailure {
            id: id.into(),
            step,
            message: message.to_string(),
        });
    }

    pub fn absorb(&mut self, other: Self) {
        self.written.extend(other.written);
        self.deleted.extend(other.deleted);
        self.failures.extend(other.failures);
    }

    /// Settle the final state.
    pub fn finish(mut self) -> Self {
        self.state = if self.failures.is_empty() {
            MutationState::Completed
        } else {
            MutationState::PartiallyFailed
        };
        self
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of a membership update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MembershipChange {
    /// At least one enum was rewritten.
    pub changed: bool,
    pub failures: Vec<StepFailure>,
}
