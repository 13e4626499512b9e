//! Ephemeral build container control through the lxc CLI.

use std::path::Path;
use std::sync::Arc;

use boxforge_shared::constants::{artifact, container as paths};
use boxforge_shared::errors::{ForgeError, ForgeResult};

use crate::util::{Invocation, ProcessRunner, ProcessStatus};

const LXC: &str = "lxc";

/// One build container, named after its template.
#[derive(Clone)]
pub struct LxcContainer {
    runner: Arc<dyn ProcessRunner>,
    name: String,
}

impl std::fmt::Debug for LxcContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LxcContainer")
            .field("name", &self.name)
            .finish()
    }
}

impl LxcContainer {
    pub fn new(runner: Arc<dyn ProcessRunner>, name: impl Into<String>) -> Self {
        Self {
            runner,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alias of the image published from this container.
    pub fn image_alias(&self) -> String {
        format!("{}{}", self.name, artifact::STAGED_SUFFIX)
    }

    /// `<container>/<path>` target understood by `lxc file push`.
    fn remote_path(&self, path: &str) -> String {
        format!("{}/{}", self.name, path.trim_start_matches('/'))
    }

    fn lxc<I, S>(args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(LXC).args(args)
    }

    /// Run `invocation`, failing the template on a non-zero exit.
    async fn step(&self, step: &str, invocation: Invocation) -> ForgeResult<()> {
        let template = self.name.clone();
        let step = step.to_string();
        self.runner
            .run_checked(&invocation, &move |status: ProcessStatus| {
                ForgeError::provisioning(template.clone(), step.clone(), status.code)
            })
            .await
    }

    pub async fn launch(&self, base_image: &str) -> ForgeResult<()> {
        self.step(
            "launch",
            Self::lxc(["launch", base_image, self.name.as_str()]),
        )
        .await
    }

    /// Run a command inside the container and return its exit status.
    pub async fn exec_status<I, S>(&self, command: I) -> ForgeResult<ProcessStatus>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = Self::lxc(["exec", self.name.as_str(), "--"]).args(command);
        self.runner.run(&invocation).await
    }

    /// Run a command inside the container; a non-zero exit fails `step`.
    pub async fn exec<I, S>(&self, step: &str, command: I) -> ForgeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = Self::lxc(["exec", self.name.as_str(), "--"]).args(command);
        self.step(step, invocation).await
    }

    pub async fn mkdir(&self, path: &str) -> ForgeResult<()> {
        self.exec(&format!("mkdir {path}"), ["mkdir", "-p", path]).await
    }

    pub async fn remove_dir(&self, path: &str) -> ForgeResult<()> {
        self.exec(&format!("remove {path}"), ["rm", "-rf", path]).await
    }

    pub async fn chmod(&self, mode: &str, path: &str) -> ForgeResult<()> {
        self.exec(&format!("chmod {path}"), ["chmod", mode, path]).await
    }

    /// Push a host file to `target`, an absolute path inside the container.
    pub async fn push_file(&self, source: &Path, target: &str) -> ForgeResult<()> {
        let invocation = Self::lxc(["file", "push"])
            .arg(source.to_string_lossy())
            .arg(self.remote_path(target));
        self.step(&format!("push {target}"), invocation).await
    }

    pub async fn stop(&self) -> ForgeResult<()> {
        self.step("stop", Self::lxc(["stop", self.name.as_str()]))
            .await
    }

    /// Publish the stopped container as a local image under [`Self::image_alias`].
    pub async fn publish(&self) -> ForgeResult<()> {
        let alias = self.image_alias();
        self.step(
            "publish",
            Self::lxc(["publish", "--force", self.name.as_str(), "--alias", alias.as_str()]),
        )
        .await
    }

    /// Export the published image as a flat archive at `dest`.
    pub async fn export(&self, dest: &Path) -> ForgeResult<()> {
        let invocation = Self::lxc(["image", "export"])
            .arg(self.image_alias())
            .arg(dest.to_string_lossy());
        self.step("export", invocation).await
    }

    /// Delete the container; returns the raw status for best-effort cleanup.
    pub async fn delete(&self) -> ForgeResult<ProcessStatus> {
        self.runner
            .run(&Self::lxc(["delete", "--force", self.name.as_str()]))
            .await
    }

    /// Delete the intermediate published image.
    pub async fn delete_image(&self) -> ForgeResult<ProcessStatus> {
        let alias = self.image_alias();
        self.runner
            .run(&Self::lxc(["image", "delete", alias.as_str()]))
            .await
    }

    /// Make a pushed script or job file executable.
    pub async fn make_executable(&self, path: &str) -> ForgeResult<()> {
        self.chmod(paths::EXEC_MODE, path).await
    }
}
