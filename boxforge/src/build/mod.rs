//! Host-side build stage: plan, stage, orchestrate the VM, collect.

mod orchestrator;
mod planner;
mod transfer;

pub use orchestrator::{BuildReport, VmOrchestrator};
pub use planner::{BuildPlan, BuildPlanner, BuildTask, InvalidTemplate};
pub use transfer::StageTransfer;
