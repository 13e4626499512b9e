use std::fmt::Write as _;

use boxforge::{BuildSummary, ForgeRuntime};
use clap::Args;

#[derive(Args, Debug, Default)]
pub struct BuildArgs {}

pub async fn execute(_args: BuildArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let runtime = global.create_runtime()?;
    run(&runtime).await
}

/// Run the host pipeline and print what happened.
///
/// Templates that failed to build are reported but do not fail the
/// command; only infrastructure errors do.
pub async fn run(runtime: &ForgeRuntime) -> anyhow::Result<()> {
    let summary = runtime.build().await?;
    print!("{}", render_summary(&summary));
    Ok(())
}

pub fn render_summary(summary: &BuildSummary) -> String {
    let mut out = String::new();
    let plan = &summary.plan;
    let report = &summary.report;

    for path in &report.built {
        let _ = writeln!(out, "built      {}", path.display());
    }
    for name in &report.failed {
        let _ = writeln!(out, "failed     {name}");
    }
    for invalid in &plan.invalid {
        let _ = writeln!(out, "invalid    {}: {}", invalid.name, invalid.reason);
    }

    let _ = writeln!(
        out,
        "{} built, {} failed, {} invalid, {} up to date",
        report.built.len(),
        report.failed.len(),
        plan.invalid.len(),
        plan.up_to_date.len()
    );
    if !report.vm_started {
        let _ = writeln!(out, "build VM not started");
    }
    out
}
