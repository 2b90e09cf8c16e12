//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Replay command arguments.
#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// Recorded property log (JSON lines)
    pub file: PathBuf,

    /// Pace frames in wall-clock time instead of running as fast as possible
    #[arg(long)]
    pub realtime: bool,

    /// Render to an HTML document written to this file
    #[arg(long, value_name = "OUT")]
    pub html: Option<PathBuf>,

    /// Output format for frame readouts and the summary
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One readout line per rendered frame, then a summary
    #[default]
    Text,
    /// Summary only, as JSON
    Json,
}
