mod cli;
mod commands;
mod config;
mod engine;
mod paths;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "replan", &mut io::stdout());
            Ok(())
        }
        command => config::Settings::load().and_then(|settings| run(&ctx, &settings, command)),
    };

    if let Err(e) = &result {
        explain(e);
    }
    result
}

fn run(ctx: &Context, settings: &config::Settings, command: Command) -> Result<()> {
    match command {
        Command::Plan(args) => commands::plan::run(ctx, settings, args),
        Command::Validate(args) => commands::validate::run(ctx, settings, args),
        Command::Batch(args) => commands::batch::run(ctx, settings, args),
        Command::Schema(args) => commands::schema::run(ctx, settings, args),
        Command::Completions { .. } => Ok(()),
    }
}

/// Print advice for engine errors found anywhere in the chain
fn explain(err: &anyhow::Error) {
    if let Some(engine_err) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<declarative::Error>())
    {
        let category = engine_err.category();
        ui::dim(&format!("{category}: {}", category.advice()));
    }
}
