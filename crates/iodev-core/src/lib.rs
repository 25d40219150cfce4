// iodev-core: Device detection, tree synthesis and device mutations over an ioBroker object store.

pub mod config;
pub mod convert;
pub mod detect;
pub mod drag;
pub mod enums;
pub mod error;
pub mod filter;
pub mod manager;
pub mod model;
pub mod mutation;
pub mod namespace;
pub mod reconciler;
pub mod smart_name;
pub mod store;
pub mod tree;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CoreConfig, SmartNameMode};
pub use detect::{DetectOptions, DetectRequest, Detector, DetectorAdapter, PatternDetector};
pub use drag::{DragSession, DragState, DropOutcome, DropPlan, DropValidator};
pub use enums::EnumCategory;
pub use error::CoreError;
pub use filter::{FilterPredicate, apply_filter};
pub use manager::DeviceManager;
pub use mutation::FolderEdit;
pub use reconciler::{ReconcilerCommand, ReconcilerHandle};
pub use smart_name::SmartName;
pub use store::{NamespaceSnapshot, ObjectCache};
pub use view::{Scope, UiState, ViewState};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Objects
    AliasLink, AliasTarget, Common, EnumCommon, ManagedObject, Name, ObjectKind, StateCommon,
    // Devices
    Device, DeviceKind, DeviceMatch, StateSlot,
    // Tree
    DisplayRecord, NodeKind, TreeNode, TreeOptions,
    // Mutations
    MembershipChange, MutationReport, MutationState, StepFailure, StepKind,
};
