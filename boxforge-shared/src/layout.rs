//! Staging-area layout shared between host and VM.
//!
//! The host writes template inputs here before the VM starts, the forge
//! reads them inside the VM and writes exported archives back:
//!
//! ```text
//! {root}/                       # host: {WorkingDirectory}/Shared, VM: /mapped
//! ├── boxforge                  # forge binary invoked over the VM control channel
//! ├── Templates/
//! │   └── {name}/               # full copy of one template needing a build
//! │       ├── config.json
//! │       ├── provision.sh
//! │       └── Root/...
//! └── {name}_Image              # exported archive, one per successful template
//! ```
//!
//! Lives in boxforge-shared so both stages resolve identical paths.

use std::path::{Path, PathBuf};

use crate::constants::{artifact, entrypoint};
use crate::errors::{ForgeError, ForgeResult};

/// Directory names inside the staging area.
pub mod dirs {
    /// Staged template directories.
    pub const TEMPLATES: &str = "Templates";

    /// Staging area name under the host working directory.
    pub const SHARED: &str = "Shared";
}

#[derive(Clone, Debug)]
pub struct StagingLayout {
    root: PathBuf,
}

impl StagingLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staged templates: {root}/Templates
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(dirs::TEMPLATES)
    }

    /// One staged template: {root}/Templates/{name}
    pub fn template_dir(&self, name: &str) -> PathBuf {
        self.templates_dir().join(name)
    }

    /// Archive the forge exports for a template: {root}/{name}_Image
    pub fn staged_artifact(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{}", artifact::STAGED_SUFFIX))
    }

    /// Locate the exported archive for a template, if the forge produced one.
    ///
    /// Container runtimes may append the archive extension to the export
    /// target, so `{name}_Image.tar.gz` is accepted as well.
    pub fn find_staged_artifact(&self, name: &str) -> Option<PathBuf> {
        let exact = self.staged_artifact(name);
        let suffixed = self.root.join(format!(
            "{name}{}.{}",
            artifact::STAGED_SUFFIX,
            artifact::STAGED_EXTENSION
        ));

        [exact, suffixed].into_iter().find(|p| p.is_file())
    }

    /// Forge binary copied in by the host: {root}/boxforge
    pub fn forge_binary(&self) -> PathBuf {
        self.root.join(entrypoint::BINARY)
    }

    /// Names of staged templates, sorted for a stable processing order.
    pub fn staged_templates(&self) -> ForgeResult<Vec<String>> {
        let dir = self.templates_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| {
            ForgeError::Storage(format!("failed to read {}: {}", dir.display(), e))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create the staging directories.
    pub fn prepare(&self) -> ForgeResult<()> {
        std::fs::create_dir_all(self.templates_dir()).map_err(|e| {
            ForgeError::Storage(format!("failed to create staging area: {e}"))
        })?;
        Ok(())
    }
}
