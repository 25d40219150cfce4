// ── Domain model ──
//
// Typed objects read from the store, detector output enriched into
// devices, display tree nodes and mutation reports.

pub mod device;
pub mod object;
pub mod report;
pub mod tree;

// ── Re-exports ──────────────────────────────────────────────────────

pub use device::{Device, DeviceKind, DeviceMatch, StateSlot};
pub use object::{
    AliasLink, AliasTarget, Common, EnumCommon, ManagedObject, Name, ObjectKind, StateCommon,
};
pub use report::{MembershipChange, MutationReport, MutationState, StepFailure, StepKind};
pub use tree::{DisplayRecord, NodeKind, TreeNode, TreeOptions};
