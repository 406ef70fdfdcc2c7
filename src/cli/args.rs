use crate::cli::step_spec::{parse_step_spec, StepSpec};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Rendering used for records and datasets printed to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    /// Only list this group (e.g. "Coercion")
    #[arg(long, value_name = "GROUP")]
    pub group: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Workspace holding tabflow.toml (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Rhai file defining exactly one transformation function
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Workspace holding tabflow.toml (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON dataset: a column map or an array of row objects
    #[arg(long, value_name = "FILE")]
    pub data: PathBuf,

    /// Step to append, as NAME[:k=v,...] or @SCRIPT[:k=v,...]; repeatable
    #[arg(long = "step", value_name = "SPEC", value_parser = parse_step_spec)]
    pub steps: Vec<StepSpec>,

    /// Advance one step at a time, reporting each step as it completes
    #[arg(long)]
    pub step_by_step: bool,

    /// Write the resulting dataset here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Format of the dataset printed to stdout (text prints JSON)
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Workspace holding tabflow.toml (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}
