//! Templates: declarative recipes for one image each.
//!
//! ```text
//! {templates_root}/{name}/
//! ├── config.json        # TemplateDescriptor
//! ├── provision.sh       # Provisioning scripts named in the descriptor
//! └── Root/              # Overlay tree mirrored onto the container's /
//! ```

mod descriptor;
pub mod scaffold;
mod store;

pub use descriptor::{StartupCommand, Template, TemplateDescriptor, TemplateVersion};
pub(crate) use descriptor::to_json_pretty;
pub use store::TemplateStore;
