//! Build VM control through the vagrant CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use boxforge_shared::constants::entrypoint;
use boxforge_shared::errors::{ForgeError, ForgeResult};

use crate::runtime::options::{ForgeSettings, VmSettings};
use crate::util::{Invocation, ProcessRunner, ProcessStatus};

const VAGRANT: &str = "vagrant";

/// One build VM, defined by the Vagrantfile in `working_dir`.
#[derive(Clone)]
pub struct BuildVm {
    runner: Arc<dyn ProcessRunner>,
    working_dir: PathBuf,
    settings: VmSettings,
}

impl std::fmt::Debug for BuildVm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildVm")
            .field("working_dir", &self.working_dir)
            .field("box", &self.settings.box_image)
            .finish()
    }
}

impl BuildVm {
    pub fn new(runner: Arc<dyn ProcessRunner>, working_dir: impl Into<PathBuf>, settings: VmSettings) -> Self {
        Self {
            runner,
            working_dir: working_dir.into(),
            settings,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn vagrant<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(VAGRANT)
            .args(args)
            .current_dir(&self.working_dir)
    }

    /// Create (fetching the box if needed) and boot the VM.
    pub async fn up(&self) -> ForgeResult<()> {
        tracing::info!(box_image = %self.settings.box_image, "Starting build VM");
        self.runner
            .run_checked(&self.vagrant(["up"]), &|status: ProcessStatus| {
                ForgeError::Infrastructure(format!("vagrant up failed with {:?}", status.code))
            })
            .await
    }

    /// Run the in-VM forge stage over the VM's control channel.
    pub async fn run_forge(&self, forge: &ForgeSettings) -> ForgeResult<ProcessStatus> {
        let command = self.forge_command(forge);
        tracing::info!("Running forge stage in VM");
        self.runner.run(&self.vagrant(["ssh", "-c", command.as_str()])).await
    }

    pub async fn halt(&self) -> ForgeResult<ProcessStatus> {
        self.runner.run(&self.vagrant(["halt"])).await
    }

    pub async fn destroy(&self) -> ForgeResult<ProcessStatus> {
        self.runner.run(&self.vagrant(["destroy", "-f"])).await
    }

    /// Shell command executed inside the VM.
    ///
    /// The staging root is passed explicitly; the forge never relies on its
    /// working directory.
    pub fn forge_command(&self, forge: &ForgeSettings) -> String {
        let mount = self.settings.guest_mount.trim_end_matches('/');
        let binary = format!("{}/{}", mount, entrypoint::BINARY);

        [
            "sudo".to_string(),
            shell_quote(&binary),
            entrypoint::BUILD_IMAGES.to_string(),
            "--root".to_string(),
            shell_quote(mount),
            "--runtime-timeout".to_string(),
            forge.runtime_ready_timeout_secs.to_string(),
            "--network-timeout".to_string(),
            forge.network_ready_timeout_secs.to_string(),
            "--poll-interval".to_string(),
            forge.poll_interval_secs.to_string(),
            "--probe-host".to_string(),
            shell_quote(&forge.network_probe_host),
        ]
        .join(" ")
    }
}

/// Single-quote a word for a POSIX shell when it needs it.
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-:=".contains(c));

    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
