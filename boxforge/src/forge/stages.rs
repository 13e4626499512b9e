//! One forge pass: a staged template turned into an exported archive.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use boxforge_shared::constants::container as paths;
use boxforge_shared::errors::{ForgeError, ForgeResult};
use boxforge_shared::layout::StagingLayout;
use walkdir::WalkDir;

use super::container::LxcContainer;
use super::cron;
use crate::runtime::options::ForgeOptions;
use crate::templates::Template;
use crate::util::wait_until;

/// Furthest point a template pass reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ForgeStage {
    /// Nothing happened yet, or the container failed to launch.
    Pending,
    Created,
    Provisioned,
    Published,
    Exported,
    Cleaned,
}

impl fmt::Display for ForgeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ForgeStage::Pending => "pending",
            ForgeStage::Created => "created",
            ForgeStage::Provisioned => "provisioned",
            ForgeStage::Published => "published",
            ForgeStage::Exported => "exported",
            ForgeStage::Cleaned => "cleaned",
        };
        f.write_str(s)
    }
}

impl ForgeStage {
    /// Whether the archive made it to the staging root.
    pub fn has_artifact(&self) -> bool {
        *self >= ForgeStage::Exported
    }
}

pub(super) struct TemplatePass<'a> {
    template: &'a Template,
    container: LxcContainer,
    staging: &'a StagingLayout,
    options: &'a ForgeOptions,
    stage: ForgeStage,
}

impl<'a> TemplatePass<'a> {
    pub(super) fn new(
        template: &'a Template,
        container: LxcContainer,
        staging: &'a StagingLayout,
        options: &'a ForgeOptions,
    ) -> Self {
        Self {
            template,
            container,
            staging,
            options,
            stage: ForgeStage::Pending,
        }
    }

    pub(super) fn stage(&self) -> ForgeStage {
        self.stage
    }

    /// Drive the container through every stage.
    ///
    /// On failure the container (and the published image, if any) are
    /// deleted best effort, and any partial archive is removed so the host
    /// never collects it.
    pub(super) async fn run(&mut self) -> ForgeResult<()> {
        let result = self.advance().await;
        if result.is_err() {
            self.abandon().await;
        }
        result
    }

    async fn advance(&mut self) -> ForgeResult<()> {
        let descriptor = &self.template.descriptor;

        self.container.launch(&descriptor.base_image).await?;
        self.stage = ForgeStage::Created;

        self.wait_for_network().await?;
        self.provision().await?;
        self.stage = ForgeStage::Provisioned;

        self.container.stop().await?;
        self.container.publish().await?;
        self.stage = ForgeStage::Published;

        self.container
            .export(&self.staging.staged_artifact(&self.template.name))
            .await?;
        self.stage = ForgeStage::Exported;

        self.release().await;
        self.stage = ForgeStage::Cleaned;
        Ok(())
    }

    async fn wait_for_network(&self) -> ForgeResult<()> {
        let host = self.options.network_probe_host.as_str();
        let what = format!("network in container {}", self.container.name());
        let container = &self.container;

        wait_until(self.options.network_ready, &what, move || async move {
            let status = container.exec_status(["getent", "hosts", host]).await?;
            Ok(status.success())
        })
        .await
    }

    async fn provision(&self) -> ForgeResult<()> {
        let name = self.template.name.as_str();

        self.container.mkdir(paths::SETUP_DIR).await?;

        let mut staged_scripts = Vec::with_capacity(self.template.descriptor.provision_scripts.len());
        for script in &self.template.descriptor.provision_scripts {
            let target = setup_target(script)?;
            self.container
                .push_file(&self.template.script_path(script), &target)
                .await?;
            self.container.make_executable(&target).await?;
            staged_scripts.push((script.as_str(), target));
        }

        self.push_overlay().await?;

        for (script, target) in &staged_scripts {
            tracing::info!(template = %name, script, "Running provisioning script");
            self.container
                .exec(&format!("run {script}"), [target.as_str()])
                .await?;
        }

        self.install_startup_jobs().await?;

        self.container.remove_dir(paths::SETUP_DIR).await
    }

    /// Mirror `Root/` onto `/`: every directory first, then every file.
    async fn push_overlay(&self) -> ForgeResult<()> {
        let root = self.template.overlay_dir();
        if !root.is_dir() {
            return Ok(());
        }

        let (dirs, files) = overlay_entries(&root)?;

        for dir in &dirs {
            self.container.mkdir(&container_path(dir)).await?;
        }
        for file in &files {
            self.container
                .push_file(&root.join(file), &container_path(file))
                .await?;
        }

        tracing::debug!(
            template = %self.template.name,
            dirs = dirs.len(),
            files = files.len(),
            "Pushed overlay"
        );
        Ok(())
    }

    /// Best-effort chmod of a startup command that looks like a script.
    /// A non-zero exit does not fail the template.
    async fn mark_script_executable(&self, script: &str) -> ForgeResult<()> {
        let status = self
            .container
            .exec_status(["chmod", paths::EXEC_MODE, script])
            .await?;
        if !status.success() {
            tracing::warn!(
                template = %self.template.name,
                script,
                code = ?status.code,
                "Could not mark startup command executable"
            );
        }
        Ok(())
    }

    async fn install_startup_jobs(&self) -> ForgeResult<()> {
        for job in cron::render_jobs(&self.template.descriptor.startup_commands) {
            let mut file = tempfile::NamedTempFile::new().map_err(|e| {
                ForgeError::Storage(format!("failed to create startup job file: {e}"))
            })?;
            file.write_all(job.contents.as_bytes())?;
            file.flush()?;

            let target = job.target();
            self.container.push_file(file.path(), &target).await?;
            self.container.make_executable(&target).await?;

            if let Some(script) = &job.script {
                self.mark_script_executable(script).await?;
            }
            tracing::debug!(template = %self.template.name, job = %job.name, "Installed startup job");
        }
        Ok(())
    }

    /// Delete the container and the intermediate image after a good export.
    async fn release(&self) {
        log_cleanup(self.container.name(), "container", self.container.delete().await);
        log_cleanup(self.container.name(), "image", self.container.delete_image().await);
    }

    async fn abandon(&self) {
        tracing::warn!(
            template = %self.template.name,
            stage = %self.stage,
            "Forge pass failed, cleaning up"
        );

        log_cleanup(self.container.name(), "container", self.container.delete().await);
        if self.stage >= ForgeStage::Published {
            log_cleanup(self.container.name(), "image", self.container.delete_image().await);
        }
        if !self.stage.has_artifact()
            && let Some(partial) = self.staging.find_staged_artifact(&self.template.name)
            && let Err(e) = std::fs::remove_file(&partial)
        {
            tracing::warn!(path = %partial.display(), "Failed to remove partial archive: {}", e);
        }
    }
}

fn log_cleanup(name: &str, what: &str, result: ForgeResult<crate::util::ProcessStatus>) {
    match result {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!(container = name, code = ?status.code, "Failed to delete {}", what),
        Err(e) => tracing::warn!(container = name, "Failed to delete {}: {}", what, e),
    }
}

/// Target of a provisioning script inside the setup directory.
fn setup_target(script: &str) -> ForgeResult<String> {
    let file_name = Path::new(script)
        .file_name()
        .ok_or_else(|| ForgeError::Config(format!("invalid provisioning script path '{script}'")))?;
    Ok(format!("{}/{}", paths::SETUP_DIR, file_name.to_string_lossy()))
}

/// Overlay directories and files, relative to `root`, in walk order.
fn overlay_entries(root: &Path) -> ForgeResult<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            ForgeError::Transfer(format!("failed to walk {}: {}", root.display(), e))
        })?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ForgeError::Internal(format!("walk escaped its root: {e}")))?
            .to_path_buf();

        if entry.file_type().is_dir() {
            dirs.push(relative);
        } else {
            files.push(relative);
        }
    }

    Ok((dirs, files))
}

/// Absolute container path mirroring an overlay-relative path.
fn container_path(relative: &Path) -> String {
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", parts.join("/"))
}
