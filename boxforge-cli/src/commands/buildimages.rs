use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use boxforge::StagingLayout;
use boxforge::forge::ContainerForge;
use boxforge::runtime::{ForgeOptions, ForgeSettings, VmSettings};
use boxforge::util::{SystemRunner, WaitPolicy};
use clap::Args;

#[derive(Args, Debug)]
pub struct BuildImagesArgs {
    /// Staging area holding Templates/ (the VM's view of the shared folder)
    #[arg(long, default_value_os_t = PathBuf::from(VmSettings::default().guest_mount))]
    pub root: PathBuf,

    /// Seconds to wait for the container runtime to answer
    #[arg(long, default_value_t = ForgeSettings::default().runtime_ready_timeout_secs)]
    pub runtime_timeout: u64,

    /// Seconds to wait for a new container to reach the network
    #[arg(long, default_value_t = ForgeSettings::default().network_ready_timeout_secs)]
    pub network_timeout: u64,

    /// Seconds between readiness probes
    #[arg(long, default_value_t = ForgeSettings::default().poll_interval_secs)]
    pub poll_interval: u64,

    /// Host name resolved inside containers to detect network readiness
    #[arg(long, default_value_t = ForgeSettings::default().network_probe_host)]
    pub probe_host: String,

    /// Skip package index refresh and container runtime initialization
    #[arg(long)]
    pub skip_setup: bool,
}

impl BuildImagesArgs {
    pub fn options(&self) -> ForgeOptions {
        let interval = Duration::from_secs(self.poll_interval);
        ForgeOptions {
            runtime_ready: WaitPolicy::new(Duration::from_secs(self.runtime_timeout), interval),
            network_ready: WaitPolicy::new(Duration::from_secs(self.network_timeout), interval),
            network_probe_host: self.probe_host.clone(),
            host_setup: !self.skip_setup,
        }
    }
}

pub async fn execute(args: BuildImagesArgs) -> anyhow::Result<()> {
    let staging = StagingLayout::new(&args.root);
    let forge = ContainerForge::new(Arc::new(SystemRunner::new()), staging, args.options());
    let report = forge.run().await?;

    for outcome in report.succeeded() {
        println!("exported   {}", outcome.name);
    }

    let failed: Vec<String> = report
        .failed()
        .map(|t| match &t.error {
            Some(e) => format!("{} ({}): {}", t.name, t.stage, e),
            None => format!("{} ({})", t.name, t.stage),
        })
        .collect();

    if !failed.is_empty() {
        anyhow::bail!(
            "{} of {} template(s) failed:\n  {}",
            failed.len(),
            report.templates.len(),
            failed.join("\n  ")
        );
    }
    Ok(())
}
