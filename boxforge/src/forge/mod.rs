//! Container image forge, run inside the build VM.
//!
//! Turns every template found in the staging area into an exported archive
//! at `{staging}/{name}_Image`, one ephemeral lxc container per template.
//! Templates are processed sequentially; a failing template never stops
//! the ones after it.

mod container;
mod cron;
mod stages;

use std::sync::Arc;

use boxforge_shared::errors::{ForgeError, ForgeResult};
use boxforge_shared::layout::StagingLayout;

use crate::runtime::options::ForgeOptions;
use crate::templates::Template;
use crate::util::{Invocation, ProcessRunner, ProcessStatus, wait_until};

pub use container::LxcContainer;
pub use cron::{CronJob, render_jobs};
pub use stages::ForgeStage;

/// What happened to one staged template.
#[derive(Debug)]
pub struct TemplateOutcome {
    pub name: String,
    pub stage: ForgeStage,
    pub error: Option<ForgeError>,
}

impl TemplateOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.stage.has_artifact()
    }
}

#[derive(Debug, Default)]
pub struct ForgeReport {
    pub templates: Vec<TemplateOutcome>,
}

impl ForgeReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &TemplateOutcome> {
        self.templates.iter().filter(|t| t.succeeded())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TemplateOutcome> {
        self.templates.iter().filter(|t| !t.succeeded())
    }

    pub fn all_succeeded(&self) -> bool {
        self.templates.iter().all(TemplateOutcome::succeeded)
    }
}

pub struct ContainerForge {
    runner: Arc<dyn ProcessRunner>,
    staging: StagingLayout,
    options: ForgeOptions,
}

impl ContainerForge {
    pub fn new(runner: Arc<dyn ProcessRunner>, staging: StagingLayout, options: ForgeOptions) -> Self {
        Self {
            runner,
            staging,
            options,
        }
    }

    /// Prepare the VM's container runtime.
    ///
    /// Waits for the runtime daemon to answer, then (with `host_setup`)
    /// refreshes the package index and initializes the runtime with
    /// defaults. Every step is idempotent.
    pub async fn initialize(&self) -> ForgeResult<()> {
        let runner = self.runner.as_ref();
        let probe = Invocation::new("lxc").arg("info");
        let probe = &probe;

        wait_until(self.options.runtime_ready, "container runtime", move || async move {
            Ok(runner.run(probe).await?.success())
        })
        .await
        .map_err(|e| match e {
            ForgeError::Timeout { .. } => {
                ForgeError::Infrastructure(format!("container runtime not ready: {e}"))
            }
            other => other,
        })?;

        if !self.options.host_setup {
            return Ok(());
        }

        for invocation in [
            Invocation::new("apt-get").arg("update"),
            Invocation::new("lxd").args(["init", "--auto"]),
        ] {
            let line = invocation.command_line();
            self.runner
                .run_checked(&invocation, &|status: ProcessStatus| {
                    ForgeError::Infrastructure(format!("{line} exited with {:?}", status.code))
                })
                .await?;
        }

        Ok(())
    }

    /// Forge every staged template.
    ///
    /// Template-scoped failures are recorded and the loop moves on. An
    /// infrastructure failure stops the run and is returned.
    pub async fn run(&self) -> ForgeResult<ForgeReport> {
        self.initialize().await?;

        let mut report = ForgeReport::default();
        for name in self.staging.staged_templates()? {
            let outcome = self.forge_one(&name).await;

            match outcome.error {
                None => tracing::info!(template = %name, "Image exported"),
                Some(ref e) if e.is_template_scoped() => {
                    tracing::warn!(template = %name, stage = %outcome.stage, "Template failed: {}", e);
                }
                Some(e) => {
                    tracing::error!(template = %name, "Aborting forge run: {}", e);
                    return Err(e);
                }
            }
            report.templates.push(outcome);
        }

        Ok(report)
    }

    async fn forge_one(&self, name: &str) -> TemplateOutcome {
        let template = match Template::load(name, self.staging.template_dir(name)) {
            Ok(template) => template,
            Err(e) => {
                return TemplateOutcome {
                    name: name.to_string(),
                    stage: ForgeStage::Pending,
                    error: Some(e),
                };
            }
        };

        tracing::info!(template = %name, version = %template.version(), "Forging image");
        let container = LxcContainer::new(self.runner.clone(), name);
        let mut pass = stages::TemplatePass::new(&template, container, &self.staging, &self.options);
        let result = pass.run().await;

        TemplateOutcome {
            name: name.to_string(),
            stage: pass.stage(),
            error: result.err(),
        }
    }
}
