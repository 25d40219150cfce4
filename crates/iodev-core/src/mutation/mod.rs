// ── Device mutations ──
//
// `plan` decides what to write; `ops` writes it.

pub mod ops;
pub mod plan;

pub use ops::{
    FolderEdit, copy_device, create_folder, delete_device, execute_tasks, move_device, move_folder,
    rename_folder, update_folder,
};
pub use plan::{CreateTask, plan_copy, rename_multiple_entries};
