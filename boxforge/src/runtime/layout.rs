use std::path::{Path, PathBuf};

use boxforge_shared::errors::{ForgeError, ForgeResult};
use boxforge_shared::layout::{StagingLayout, dirs as staging_dirs};

use crate::images::ImageCatalog;
use crate::runtime::options::{VmSettings, WorkspaceConfig};
use crate::templates::TemplateStore;
use crate::vmm::vagrantfile;

/// Host-side workspace layout, every path resolved against the directory
/// holding the workspace config.
///
/// ```text
/// {base}/
/// ├── config.json
/// ├── Containers/Templates/    # TemplateStore
/// ├── Containers/Images/       # ImageCatalog
/// └── Temp/                    # working directory, exists only during a build
///     ├── Vagrantfile
///     └── Shared/              # StagingLayout, mounted in the VM
/// ```
#[derive(Clone, Debug)]
pub struct WorkspaceLayout {
    working_dir: PathBuf,
    templates_dir: PathBuf,
    images_dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(working_dir: PathBuf, templates_dir: PathBuf, images_dir: PathBuf) -> Self {
        Self {
            working_dir,
            templates_dir,
            images_dir,
        }
    }

    /// Resolve the configured directories; relative ones are taken from `base_dir`.
    pub fn from_config(config: &WorkspaceConfig, base_dir: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base_dir.join(p)
            }
        };

        Self::new(
            resolve(&config.working_directory),
            resolve(&config.containers.templates),
            resolve(&config.containers.images),
        )
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Staging area shared with the VM: {working_dir}/Shared
    pub fn staging(&self) -> StagingLayout {
        StagingLayout::new(self.working_dir.join(staging_dirs::SHARED))
    }

    pub fn vagrantfile_path(&self) -> PathBuf {
        self.working_dir.join(vagrantfile::FILE_NAME)
    }

    pub fn template_store(&self) -> TemplateStore {
        TemplateStore::new(&self.templates_dir)
    }

    pub fn image_catalog(&self) -> ImageCatalog {
        ImageCatalog::new(&self.images_dir)
    }

    /// Recreate a clean working directory for a build.
    ///
    /// Any leftover working directory is removed first. Creates the staging
    /// area, writes the Vagrantfile and makes sure the templates and images
    /// roots exist.
    pub fn prepare(&self, vm: &VmSettings) -> ForgeResult<()> {
        self.cleanup()?;

        std::fs::create_dir_all(&self.working_dir).map_err(|e| {
            ForgeError::Storage(format!("failed to create working dir: {e}"))
        })?;

        self.staging().prepare()?;

        std::fs::write(self.vagrantfile_path(), vagrantfile::render(vm, staging_dirs::SHARED))
            .map_err(|e| ForgeError::Storage(format!("failed to write Vagrantfile: {e}")))?;

        std::fs::create_dir_all(&self.templates_dir).map_err(|e| {
            ForgeError::Storage(format!("failed to create templates dir: {e}"))
        })?;

        std::fs::create_dir_all(&self.images_dir)
            .map_err(|e| ForgeError::Storage(format!("failed to create images dir: {e}")))?;

        Ok(())
    }

    /// Remove the working directory (staging area included), if present.
    pub fn cleanup(&self) -> ForgeResult<()> {
        if self.working_dir.exists() {
            std::fs::remove_dir_all(&self.working_dir).map_err(|e| {
                ForgeError::Storage(format!(
                    "failed to remove working dir {}: {}",
                    self.working_dir.display(),
                    e
                ))
            })?;
            tracing::debug!(dir = %self.working_dir.display(), "Removed working directory");
        }
        Ok(())
    }
}
