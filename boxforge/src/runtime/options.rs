//! Workspace configuration (`config.json` next to the templates).

use std::path::{Path, PathBuf};
use std::time::Duration;

use boxforge_shared::errors::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};

use crate::templates::to_json_pretty;
use crate::util::WaitPolicy;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "config.json";

/// Top-level workspace configuration.
///
/// Only `WorkingDirectory` and `Containers` are required in the file; the
/// `Vm` and `Forge` sections fall back to defaults when absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Scratch directory holding the Vagrantfile and the staging area.
    /// Removed and recreated on every build.
    #[serde(rename = "WorkingDirectory")]
    pub working_directory: PathBuf,

    #[serde(rename = "Containers")]
    pub containers: ContainerDirs,

    #[serde(rename = "Vm", default)]
    pub vm: VmSettings,

    #[serde(rename = "Forge", default)]
    pub forge: ForgeSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDirs {
    #[serde(rename = "Templates")]
    pub templates: PathBuf,

    #[serde(rename = "Images")]
    pub images: PathBuf,
}

/// Build VM settings, rendered into the Vagrantfile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSettings {
    #[serde(rename = "Box", default = "default_box")]
    pub box_image: String,

    #[serde(rename = "Provider", default = "default_provider")]
    pub provider: String,

    #[serde(rename = "MemoryMib", default = "default_memory_mib")]
    pub memory_mib: u32,

    /// Where the staging area appears inside the VM.
    #[serde(rename = "GuestMount", default = "default_guest_mount")]
    pub guest_mount: String,
}

/// In-VM forge settings, passed to `buildimages` on its command line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeSettings {
    #[serde(rename = "RuntimeReadyTimeoutSecs", default = "default_runtime_timeout")]
    pub runtime_ready_timeout_secs: u64,

    #[serde(rename = "NetworkReadyTimeoutSecs", default = "default_network_timeout")]
    pub network_ready_timeout_secs: u64,

    #[serde(rename = "PollIntervalSecs", default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Hostname resolved inside a new container to decide its network is up.
    #[serde(rename = "NetworkProbeHost", default = "default_probe_host")]
    pub network_probe_host: String,

    /// Binary copied into the staging area for the VM to run.
    /// Defaults to the running executable.
    #[serde(rename = "ForgeBinary", default, skip_serializing_if = "Option::is_none")]
    pub forge_binary: Option<PathBuf>,
}

fn default_box() -> String {
    "generic/ubuntu2010".to_string()
}

fn default_provider() -> String {
    "virtualbox".to_string()
}

fn default_memory_mib() -> u32 {
    2048
}

fn default_guest_mount() -> String {
    "/mapped".to_string()
}

fn default_runtime_timeout() -> u64 {
    120
}

fn default_network_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    2
}

fn default_probe_host() -> String {
    "archive.ubuntu.com".to_string()
}

impl Default for VmSettings {
    fn default() -> Self {
        Self {
            box_image: default_box(),
            provider: default_provider(),
            memory_mib: default_memory_mib(),
            guest_mount: default_guest_mount(),
        }
    }
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            runtime_ready_timeout_secs: default_runtime_timeout(),
            network_ready_timeout_secs: default_network_timeout(),
            poll_interval_secs: default_poll_interval(),
            network_probe_host: default_probe_host(),
            forge_binary: None,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            working_directory: PathBuf::from("Temp"),
            containers: ContainerDirs {
                templates: PathBuf::from("Containers/Templates"),
                images: PathBuf::from("Containers/Images"),
            },
            vm: VmSettings::default(),
            forge: ForgeSettings::default(),
        }
    }
}

impl WorkspaceConfig {
    /// Load the config file, writing the defaults first if it does not exist.
    pub fn load_or_init(path: &Path) -> ForgeResult<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            tracing::info!(path = %path.display(), "Wrote default workspace config");
            return Ok(config);
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            ForgeError::Config(format!("malformed workspace config {}: {}", path.display(), e))
        })
    }

    pub fn save(&self, path: &Path) -> ForgeResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, to_json_pretty(self)?).map_err(|e| {
            ForgeError::Storage(format!("failed to write {}: {}", path.display(), e))
        })
    }
}

/// Resolved forge behaviour, built from [`ForgeSettings`] or CLI flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForgeOptions {
    /// Wait for the container runtime daemon to answer.
    pub runtime_ready: WaitPolicy,

    /// Wait for a freshly launched container to resolve `network_probe_host`.
    pub network_ready: WaitPolicy,

    pub network_probe_host: String,

    /// Refresh the package index and initialize the container runtime
    /// before building.
    pub host_setup: bool,
}

impl From<&ForgeSettings> for ForgeOptions {
    fn from(settings: &ForgeSettings) -> Self {
        let interval = Duration::from_secs(settings.poll_interval_secs);
        Self {
            runtime_ready: WaitPolicy::new(
                Duration::from_secs(settings.runtime_ready_timeout_secs),
                interval,
            ),
            network_ready: WaitPolicy::new(
                Duration::from_secs(settings.network_ready_timeout_secs),
                interval,
            ),
            network_probe_host: settings.network_probe_host.clone(),
            host_setup: true,
        }
    }
}

impl Default for ForgeOptions {
    fn default() -> Self {
        Self::from(&ForgeSettings::default())
    }
}
