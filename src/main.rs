mod cli;
mod commands;
mod config;
mod model;
mod scoring;
mod semantic;
mod text;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::Workspace;

fn main() {
    init_tracing();

    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!(error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            std::process::exit(1);
        }
    }
}

/// Runs the selected command and returns its exit status.
fn run() -> Result<i32> {
    let cli = Cli::parse();
    let workspace = Workspace::load(&cli.root, cli.config.as_deref())?;

    match cli.command {
        Commands::Setup => commands::setup::run(&workspace).map(|_| 0),
        Commands::PrepareGold(args) => commands::gold::run(&workspace, args).map(|_| 0),
        Commands::Dummy(args) => commands::dummy::run(&workspace, args).map(|_| 0),
        Commands::Validate(args) => commands::validate::run(&workspace, args)
            .map(|report| commands::validate::exit_code(&report)),
        Commands::Score(args) => commands::score::run(&workspace, args).map(|_| 0),
        Commands::Status => commands::status::run(&workspace).map(|_| 0),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
