//! Host-side entry point tying the workspace to the build pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use boxforge_shared::errors::{ForgeError, ForgeResult};

use crate::build::{BuildPlan, BuildPlanner, BuildReport, StageTransfer, VmOrchestrator};
use crate::runtime::layout::WorkspaceLayout;
use crate::runtime::lock::WorkspaceLock;
use crate::runtime::options::WorkspaceConfig;
use crate::templates::scaffold;
use crate::util::ProcessRunner;
use crate::vmm::BuildVm;

/// Everything a `build` run decided and produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub plan: BuildPlan,
    pub report: BuildReport,
}

/// A workspace: its configuration, resolved layout and the process runner
/// used for every external tool.
#[derive(Clone)]
pub struct ForgeRuntime {
    config: WorkspaceConfig,
    base_dir: PathBuf,
    layout: WorkspaceLayout,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for ForgeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeRuntime")
            .field("base_dir", &self.base_dir)
            .field("layout", &self.layout)
            .finish()
    }
}

impl ForgeRuntime {
    /// Open the workspace described by `config_path`, writing a default
    /// configuration there first if none exists.
    ///
    /// Relative directories in the configuration are resolved against the
    /// directory holding the file.
    pub fn open(config_path: &Path, runner: Arc<dyn ProcessRunner>) -> ForgeResult<Self> {
        let config_path = std::path::absolute(config_path).map_err(|e| {
            ForgeError::Config(format!("invalid config path {}: {}", config_path.display(), e))
        })?;
        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ForgeError::Config("config path has no parent directory".into()))?;

        let config = WorkspaceConfig::load_or_init(&config_path)?;
        Ok(Self::new(config, base_dir, runner))
    }

    pub fn new(config: WorkspaceConfig, base_dir: PathBuf, runner: Arc<dyn ProcessRunner>) -> Self {
        let layout = WorkspaceLayout::from_config(&config, &base_dir);
        Self {
            config,
            base_dir,
            layout,
            runner,
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Scaffold a blank template in the templates root.
    pub fn add_template(&self, name: &str, base_image: &str) -> ForgeResult<PathBuf> {
        scaffold::create_template(self.layout.templates_dir(), name, base_image)
    }

    /// Run the full host-side pipeline.
    ///
    /// Prepares a fresh working directory, plans, and when anything needs
    /// building installs the forge binary into the staging area and drives
    /// the build VM. The working directory never outlives the call.
    pub async fn build(&self) -> ForgeResult<BuildSummary> {
        let _lock = WorkspaceLock::acquire(&self.base_dir)?;

        let transfer = StageTransfer::new(self.layout.staging());
        let plan = match self.stage(&transfer) {
            Ok(plan) => plan,
            Err(e) => {
                if let Err(cleanup) = self.layout.cleanup() {
                    tracing::warn!("Failed to clean up after staging error: {}", cleanup);
                }
                return Err(e);
            }
        };

        tracing::info!(
            pending = plan.tasks.len(),
            up_to_date = plan.up_to_date.len(),
            invalid = plan.invalid.len(),
            "Build planned"
        );

        let vm = BuildVm::new(
            self.runner.clone(),
            self.layout.working_dir(),
            self.config.vm.clone(),
        );
        let report = VmOrchestrator::new(&vm, &transfer, &self.config.forge)
            .run_build(&plan.tasks)
            .await?;

        Ok(BuildSummary { plan, report })
    }

    fn stage(&self, transfer: &StageTransfer) -> ForgeResult<BuildPlan> {
        self.layout.prepare(&self.config.vm)?;

        let store = self.layout.template_store();
        let catalog = self.layout.image_catalog();
        let plan = BuildPlanner::new(&store, &catalog, transfer).plan()?;

        if !plan.is_empty() {
            transfer.install_forge_binary(&self.forge_binary()?)?;
        }
        Ok(plan)
    }

    /// The executable run inside the VM: the configured one, else ourselves.
    fn forge_binary(&self) -> ForgeResult<PathBuf> {
        match &self.config.forge.forge_binary {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) => Ok(self.base_dir.join(path)),
            None => std::env::current_exe().map_err(|e| {
                ForgeError::Internal(format!("cannot locate own executable: {e}"))
            }),
        }
    }
}
