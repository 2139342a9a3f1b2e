//! djx command-line application.
//!
//! Resolves the workspace settings from the global flags, then hands the
//! subcommand to [`Cli`].

mod args;
mod cli;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use djx_core::SettingsBuilder;
use log::info;
use renderer::TerminalRenderer;
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        home,
        engine,
        no_color,
        command,
    } = Args::parse();

    let settings = SettingsBuilder::new()
        .with_home(home)
        .with_engine(engine.as_deref())
        .build()
        .context("Failed to initialize workspace")?;

    info!("djx started in {}", settings.home.display());

    let cli = Cli::new(settings, TerminalRenderer::new(!no_color));
    match command {
        Plan(args) => cli.handle_plan(args).await,
        Apply(args) => cli.handle_apply(args).await,
        Trace(args) => cli.handle_trace(args).await,
        Plans(args) => cli.handle_plans(args).await,
        Templates(args) => cli.handle_templates(args),
        Evaluate(args) => cli.handle_evaluate(args).await,
    }
}
