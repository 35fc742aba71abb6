// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `taskgraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskgraph",
    version,
    about = "Generate, optimize and submit CI task graphs.",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKGRAPH_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the full task graph.
    Full(ShowArgs),
    /// Print the target task set.
    Target(ShowArgs),
    /// Print the target task graph (targets plus their dependencies).
    TargetGraph(ShowArgs),
    /// Print the optimized task graph.
    Optimized(ShowArgs),
    /// Print the morphed task graph, as it would be submitted.
    Morphed(ShowArgs),
    /// Generate everything, write artifacts and submit the tasks.
    Decision(DecisionArgs),
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Directory containing `taskgraph.toml`.
    #[arg(long, value_name = "DIR", default_value = "taskcluster")]
    pub root: PathBuf,

    /// Parameters file (`.json` or `.toml`). Defaults apply when omitted.
    #[arg(long, short = 'p', value_name = "PATH")]
    pub parameters: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Print only the labels, one per line.
    #[arg(long)]
    pub labels: bool,
}

#[derive(Debug, Clone, Args)]
pub struct DecisionArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Directory the artifacts are written to.
    #[arg(long, value_name = "DIR", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Generate and write artifacts, but don't submit anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
