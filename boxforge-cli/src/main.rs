mod cli;
mod commands;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(cli::normalize_args(std::env::args_os()));
    let _log_guard = boxforge::init_tracing(cli.global.log_dir.as_deref());

    match cli.command {
        Some(Commands::Build(args)) => commands::build::execute(args, &cli.global).await,
        Some(Commands::BuildImages(args)) => commands::buildimages::execute(args).await,
        None => commands::interactive::execute(&cli.global).await,
    }
}
