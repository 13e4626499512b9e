pub mod layout;
mod lock;
pub mod options;

mod core;
pub use core::{BuildSummary, ForgeRuntime};
pub use layout::WorkspaceLayout;
pub use lock::{LOCK_FILE, WorkspaceLock};
pub use options::{ForgeOptions, ForgeSettings, VmSettings, WorkspaceConfig};
