//! VM lifecycle: boot, run the forge stage, collect artifacts, tear down.

use std::path::{Path, PathBuf};

use boxforge_shared::errors::ForgeResult;

use super::planner::BuildTask;
use super::transfer::StageTransfer;
use crate::runtime::options::ForgeSettings;
use crate::vmm::BuildVm;

/// Outcome of one orchestrated build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Catalog paths of the artifacts collected this run.
    pub built: Vec<PathBuf>,
    /// Templates whose artifact was missing or could not be relocated.
    pub failed: Vec<String>,
    pub vm_started: bool,
}

/// Removes the working directory if the build is abandoned mid-flight.
///
/// Async VM teardown cannot run from `Drop`; the guard only handles the
/// filesystem side and reports the leak.
struct TeardownGuard {
    working_dir: PathBuf,
    armed: bool,
}

impl TeardownGuard {
    fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        tracing::warn!(
            working_dir = %self.working_dir.display(),
            "Build abandoned before teardown, build VM may still exist"
        );
        if let Err(e) = std::fs::remove_dir_all(&self.working_dir) {
            tracing::warn!("Failed to remove working directory: {}", e);
        }
    }
}

pub struct VmOrchestrator<'a> {
    vm: &'a BuildVm,
    transfer: &'a StageTransfer,
    forge: &'a ForgeSettings,
}

impl<'a> VmOrchestrator<'a> {
    pub fn new(vm: &'a BuildVm, transfer: &'a StageTransfer, forge: &'a ForgeSettings) -> Self {
        Self { vm, transfer, forge }
    }

    /// Build every task inside one VM.
    ///
    /// With no tasks nothing is started. Otherwise teardown (halt, destroy,
    /// remove the working directory) runs exactly once whatever happens in
    /// between; a VM that fails to boot is reported after teardown.
    pub async fn run_build(&self, tasks: &[BuildTask]) -> ForgeResult<BuildReport> {
        if tasks.is_empty() {
            tracing::info!("All images up to date, build VM not needed");
            self.remove_working_dir();
            return Ok(BuildReport::default());
        }

        let mut guard = TeardownGuard::new(self.vm.working_dir());
        let result = self.drive(tasks).await;
        self.teardown().await;
        guard.disarm();

        result
    }

    async fn drive(&self, tasks: &[BuildTask]) -> ForgeResult<BuildReport> {
        self.vm.up().await?;

        let mut report = BuildReport {
            vm_started: true,
            ..Default::default()
        };

        match self.vm.run_forge(self.forge).await {
            Ok(status) if status.success() => tracing::info!("Forge stage finished"),
            Ok(status) => tracing::warn!(
                code = ?status.code,
                "Forge stage exited with failure, collecting what was produced"
            ),
            Err(e) => tracing::warn!("Forge stage could not run: {}", e),
        }

        for task in tasks {
            match self.transfer.collect_artifact(task.name(), &task.output_path) {
                Ok(true) => report.built.push(task.output_path.clone()),
                Ok(false) => {
                    tracing::warn!(template = %task.name(), version = %task.version(), "No image produced");
                    report.failed.push(task.name().to_string());
                }
                Err(e) => {
                    tracing::warn!(template = %task.name(), "Failed to collect image: {}", e);
                    report.failed.push(task.name().to_string());
                }
            }
        }

        Ok(report)
    }

    async fn teardown(&self) {
        match self.vm.halt().await {
            Ok(status) if !status.success() => {
                tracing::warn!(code = ?status.code, "vagrant halt failed");
            }
            Err(e) => tracing::warn!("vagrant halt failed: {}", e),
            Ok(_) => {}
        }

        match self.vm.destroy().await {
            Ok(status) if !status.success() => {
                tracing::warn!(code = ?status.code, "vagrant destroy failed");
            }
            Err(e) => tracing::warn!("vagrant destroy failed: {}", e),
            Ok(_) => {}
        }

        self.remove_working_dir();
    }

    fn remove_working_dir(&self) {
        let dir = self.vm.working_dir();
        if dir.exists()
            && let Err(e) = std::fs::remove_dir_all(dir)
        {
            tracing::warn!(working_dir = %dir.display(), "Failed to remove working directory: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::options::VmSettings;
    use crate::templates::TemplateStore;
    use crate::testing::{ScriptedRunner, TemplateFixture};
    use boxforge_shared::errors::ForgeError;
    use boxforge_shared::layout::StagingLayout;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        working_dir: PathBuf,
        transfer: StageTransfer,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let working_dir = temp.path().join("Temp");
            let staging = StagingLayout::new(working_dir.join("Shared"));
            staging.prepare().unwrap();
            Self {
                temp,
                working_dir,
                transfer: StageTransfer::new(staging),
            }
        }

        fn task(&self, name: &str) -> BuildTask {
            let templates = self.temp.path().join("Templates");
            TemplateFixture::new(name).write_to(&templates);
            let template = TemplateStore::new(&templates).load(name).unwrap();
            let output_path = self
                .temp
                .path()
                .join(format!("Images/{name}/0/1/0/{name}_0.1.0.1.tar.gz"));
            BuildTask {
                template,
                output_path,
            }
        }

        async fn run(&self, runner: Arc<ScriptedRunner>, tasks: &[BuildTask]) -> ForgeResult<BuildReport> {
            let vm = BuildVm::new(runner, &self.working_dir, VmSettings::default());
            let forge = ForgeSettings::default();
            VmOrchestrator::new(&vm, &self.transfer, &forge)
                .run_build(tasks)
                .await
        }
    }

    #[tokio::test]
    async fn test_empty_plan_starts_no_vm() {
        let fx = Fixture::new();
        let runner = Arc::new(ScriptedRunner::new());

        let report = fx.run(runner.clone(), &[]).await.unwrap();

        assert!(!report.vm_started);
        assert!(runner.calls().is_empty());
        assert!(!fx.working_dir.exists());
    }

    #[tokio::test]
    async fn test_collects_artifacts_and_tears_down_in_order() {
        let fx = Fixture::new();
        let staged = fx.transfer.staging().staged_artifact("web");
        let runner = Arc::new(ScriptedRunner::new().on_run("vagrant ssh", move |_| {
            std::fs::write(&staged, b"archive").unwrap();
        }));
        let task = fx.task("web");

        let report = fx.run(runner.clone(), std::slice::from_ref(&task)).await.unwrap();

        assert!(report.vm_started);
        assert_eq!(report.built, vec![task.output_path.clone()]);
        assert!(report.failed.is_empty());
        assert_eq!(std::fs::read(&task.output_path).unwrap(), b"archive");
        assert!(!fx.working_dir.exists());

        let lines = runner.command_lines();
        assert_eq!(lines.first().map(String::as_str), Some("vagrant up"));
        assert!(lines[1].starts_with("vagrant ssh -c"));
        assert_eq!(&lines[2..], ["vagrant halt", "vagrant destroy -f"]);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_only_that_template() {
        let fx = Fixture::new();
        let staged = fx.transfer.staging().staged_artifact("api");
        let runner = Arc::new(ScriptedRunner::new().on_run("vagrant ssh", move |_| {
            std::fs::write(&staged, b"archive").unwrap();
        }));
        let tasks = [fx.task("web"), fx.task("api")];

        let report = fx.run(runner, &tasks).await.unwrap();

        assert_eq!(report.failed, vec!["web"]);
        assert_eq!(report.built, vec![tasks[1].output_path.clone()]);
        assert!(!tasks[0].output_path.exists());
    }

    #[tokio::test]
    async fn test_forge_failure_still_tears_down() {
        let fx = Fixture::new();
        let runner = Arc::new(ScriptedRunner::new().exit_code("vagrant ssh", 1));
        let task = fx.task("web");

        let report = fx.run(runner.clone(), &[task]).await.unwrap();

        assert_eq!(report.failed, vec!["web"]);
        assert_eq!(runner.count("vagrant halt"), 1);
        assert_eq!(runner.count("vagrant destroy -f"), 1);
        assert!(!fx.working_dir.exists());
    }

    #[tokio::test]
    async fn test_boot_failure_propagates_after_teardown() {
        let fx = Fixture::new();
        let runner = Arc::new(ScriptedRunner::new().exit_code("vagrant up", 1));
        let task = fx.task("web");

        let err = fx.run(runner.clone(), &[task]).await.unwrap_err();

        assert!(matches!(err, ForgeError::Infrastructure(_)));
        assert_eq!(runner.count("vagrant ssh"), 0);
        assert_eq!(runner.count("vagrant halt"), 1);
        assert_eq!(runner.count("vagrant destroy -f"), 1);
        assert!(!fx.working_dir.exists());
    }

    #[tokio::test]
    async fn test_teardown_errors_are_absorbed() {
        let fx = Fixture::new();
        let runner = Arc::new(
            ScriptedRunner::new()
                .spawn_error("vagrant halt")
                .exit_code("vagrant destroy", 2),
        );
        let task = fx.task("web");

        let report = fx.run(runner.clone(), &[task]).await.unwrap();

        assert!(report.vm_started);
        assert_eq!(runner.count("vagrant destroy -f"), 1);
        assert!(!fx.working_dir.exists());
    }
}
