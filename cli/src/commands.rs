//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// Only the synthesized content (run/show)
    Content,
    /// JSON document
    Json,
}

/// CLI arguments for quorum-gate
#[derive(Parser, Debug)]
#[command(name = "quorum-gate")]
#[command(author, version, about = "Quality gates decided by a quorum of AI coding agents")]
#[command(long_about = r#"
quorum-gate runs a roster of AI coding-agent CLIs concurrently against the same
task, retries transient failures, records every output in a local SQLite store,
and settles the round with a quorum rule.

Configuration files are loaded from (in priority order):
1. QUORUM_GATE_* environment variables
2. --config <path>                           Explicit config file
3. ./quorum-gate.toml                        Project-level config
4. ~/.config/quorum-gate/config.toml         Global config

Example:
  quorum-gate run SPEC-42 plan --input-file prompt.md
  quorum-gate list --milestone SPEC-42
  quorum-gate show 0b6c5d0e-2f1a-4f7e-9a53-1c2d3e4f5a6b --output content
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Override the store database path
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one consensus round for a milestone stage
    Run(RunArgs),

    /// Show a stored round with every agent output
    Show {
        /// Round id (UUID)
        round_id: String,

        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// List stored rounds, newest first
    List {
        #[arg(long)]
        milestone: Option<String>,

        #[arg(long)]
        stage: Option<String>,

        /// Maximum number of rounds to list
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Delete rounds past retention and reclaim space
    Maintain {
        /// Keep running maintenance on the configured interval until Ctrl-C
        #[arg(long)]
        daemon: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Milestone identifier (e.g. SPEC-42)
    pub milestone: String,

    /// Stage name; its roster comes from the [stages] table
    pub stage: String,

    /// Prompt text piped to every agent's stdin
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read the prompt from a file ("-" for stdin)
    #[arg(long, value_name = "PATH")]
    pub input_file: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective merged configuration as TOML
    Show,
    /// Report configuration issues
    Validate,
    /// Show configuration file locations
    Paths,
}
