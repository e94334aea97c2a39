use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(version)]
#[command(about = "Reconcile machine configuration against declarative manifests", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what would change, without touching the target
    Plan(ReconcileArgs),

    /// Bring the target to the manifest's desired state
    Apply(ReconcileArgs),

    /// Show the declared templates and their properties
    Show(ShowArgs),

    /// Execute one script as a job and print its captured outputs
    Run(RunArgs),
}

#[derive(Parser)]
pub struct ReconcileArgs {
    /// Manifest to reconcile
    #[arg(short, long, default_value = "converge.toml")]
    pub manifest: PathBuf,

    /// Only the template with this configuration key
    pub key: Option<String>,
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Manifest to read
    #[arg(short, long, default_value = "converge.toml")]
    pub manifest: PathBuf,

    /// Only the template with this configuration key
    pub key: Option<String>,

    /// Print encrypted property values instead of masking them
    #[arg(long)]
    pub reveal_secrets: bool,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Script file to execute
    pub script: PathBuf,

    /// Input variable, exported to the script's environment
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Capture the named output variable
    #[arg(long = "out", value_name = "NAME")]
    pub outs: Vec<String>,

    /// Capture every output variable the script produces
    #[arg(long, conflicts_with = "outs")]
    pub all_outputs: bool,

    /// Interpreter to run the script with
    #[arg(long, default_value = "sh")]
    pub interpreter: String,

    /// Forward the script's debug stream to the log
    #[arg(long)]
    pub debug_logging: bool,

    /// Forward the script's verbose stream to the log
    #[arg(long)]
    pub verbose_logging: bool,
}
