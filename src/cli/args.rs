//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};

use crate::cli::commands::{
    compare::CompareArgs, completions::CompletionsArgs, config::ConfigCommands,
    extract::ExtractArgs, inspect::InspectArgs, run::RunArgs,
};

#[derive(Parser)]
#[command(name = "dimspect")]
#[command(author, version, about = "Dimensional inspection against CAD nominals")]
#[command(long_about = "Extracts nominal dimensions from a 2D CAD drawing, measures parts from detected shapes, and checks every measurement against the nominal within absolute and relative tolerances.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging on stderr)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract nominal dimensions from a CAD drawing
    Extract(ExtractArgs),

    /// Run an inspection session over a frame stream
    Inspect(InspectArgs),

    /// Compare a measurement log against the nominal table
    Compare(CompareArgs),

    /// Extract, inspect and compare in one go
    Run(RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables and status lines
    #[default]
    Auto,
    /// JSON format (for programming)
    Json,
    /// YAML format (full fidelity)
    Yaml,
    /// CSV format (for spreadsheets)
    Csv,
}
