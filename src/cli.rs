//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Layered knowledge index for source code projects
#[derive(Parser, Debug)]
#[command(name = "ontoindex")]
#[command(about = "Build and refresh a structure/semantics/domain index of a codebase")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every layer from scratch
    #[command(visible_alias = "b")]
    Build(ProjectArgs),

    /// Update the index for files changed since the last build
    #[command(visible_alias = "r")]
    Refresh(ProjectArgs),

    /// Show cache state and pending changes
    Status(ProjectArgs),

    /// Print the domain analysis inputs without calling an AI backend
    Context(ProjectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file, defaults to ontoindex.toml in the project root
    #[arg(short, long, env = "ONTOINDEX_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    #[value(alias = "pretty")]
    Text,
    /// The report as JSON
    Json,
}

impl Commands {
    pub fn project(&self) -> &ProjectArgs {
        match self {
            Self::Build(args) | Self::Refresh(args) | Self::Status(args) | Self::Context(args) => args,
        }
    }
}
