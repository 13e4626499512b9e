use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use boxforge::ForgeRuntime;
use boxforge::runtime::options::CONFIG_FILE;
use boxforge::util::SystemRunner;
use clap::{Args, Parser, Subcommand};

use crate::commands::build::BuildArgs;
use crate::commands::buildimages::BuildImagesArgs;

/// Build versioned container images from templates inside a disposable VM.
///
/// Without a subcommand, runs interactively.
#[derive(Parser, Debug)]
#[command(name = "boxforge", author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every template that has no image for its current version
    Build(BuildArgs),

    /// Forge the staged templates (run inside the build VM)
    #[command(name = "buildimages")]
    BuildImages(BuildImagesArgs),
}

/// `build` is accepted in any case when it is the first argument.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| match arg.to_str() {
            Some(s) if i == 1 && s.eq_ignore_ascii_case("build") => OsString::from("build"),
            _ => arg,
        })
        .collect()
}

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Workspace configuration file; created with defaults if missing
    #[arg(long, global = true, env = "BOXFORGE_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Also write logs to boxforge.log in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn create_runtime(&self) -> anyhow::Result<ForgeRuntime> {
        Ok(ForgeRuntime::open(&self.config, Arc::new(SystemRunner::new()))?)
    }
}
