pub mod args;
pub mod commands;
pub mod step_spec;

pub use args::{CatalogArgs, InspectArgs, OutputFormat, RunArgs};
pub use step_spec::{StepSpec, StepTarget};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
PIPELINE COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "tabflow")]
#[command(version = crate::VERSION)]
#[command(about = "Build and run transformation pipelines over tabular data")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: browse the catalog, inspect your own scripts, then run a pipeline over a JSON dataset."
)]
pub struct Args {
    /// Silence log output on the console
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "List the built-in transformations",
        long_about = "Catalog prints every registered transformation with its signature and documentation, grouped by category.",
        after_help = "Example:\n    tabflow catalog --group Coercion --format json"
    )]
    Catalog(CatalogArgs),
    #[command(
        about = "Resolve a script and print its descriptor",
        long_about = "Inspect compiles a Rhai file defining exactly one function and prints the descriptor record a pipeline would store for it.",
        after_help = "Example:\n    tabflow inspect steps/add_one.rhai --format yaml"
    )]
    Inspect(InspectArgs),
    #[command(
        about = "Run a pipeline over a dataset",
        long_about = "Run loads a JSON dataset, appends the given steps in order and executes them, either in one pass or step by step.",
        after_help = "Example:\n    tabflow run --data data.json --step multiply_column:column=B,factor=10 --step @steps/add_one.rhai:col=A"
    )]
    Run(RunArgs),
}

impl Command {
    /// Workspace used for configuration lookup.
    pub fn workspace(&self) -> Option<PathBuf> {
        let explicit = match self {
            Command::Catalog(args) => args.workspace.clone(),
            Command::Inspect(args) => args.workspace.clone(),
            Command::Run(args) => args.workspace.clone(),
        };
        explicit.or_else(|| std::env::current_dir().ok())
    }
}

pub fn run(args: Args) -> crate::Result<()> {
    let workspace = args.command.workspace();
    match args.command {
        Command::Catalog(catalog_args) => commands::catalog(catalog_args, workspace),
        Command::Inspect(inspect_args) => commands::inspect(inspect_args, workspace),
        Command::Run(run_args) => commands::run(run_args, workspace),
    }
}
