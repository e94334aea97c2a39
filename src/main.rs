mod cli;
mod commands;
mod schema;
mod ui;

use clap::Parser;
use cli::{Cli, Command};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
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

    let result = match cli.command {
        Command::Plan(args) => commands::reconcile::plan(&args).await,
        Command::Apply(args) => commands::reconcile::apply(&args).await,
        Command::Show(args) => commands::reconcile::show(&args),
        Command::Run(args) => commands::run::run(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            ui::error(&format!("{err:#}"));
            ExitCode::from(1)
        }
    }
}
