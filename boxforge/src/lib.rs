//! boxforge: versioned container images built from declarative templates.
//!
//! The host stage ([`runtime::ForgeRuntime::build`]) plans which templates
//! lack an image, stages them, boots a disposable build VM and collects the
//! exported archives into the image catalog. Inside the VM the forge stage
//! ([`forge::ContainerForge`]) provisions one ephemeral lxc container per
//! staged template and exports it.

pub mod build;
pub mod forge;
pub mod images;
pub mod runtime;
pub mod templates;
pub mod util;
pub mod vmm;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use boxforge_shared::errors::{ForgeError, ForgeResult};
pub use boxforge_shared::layout::StagingLayout;
pub use runtime::{BuildSummary, ForgeRuntime};
pub use util::init_tracing;
