//! CLI definitions for the harvester binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Context harvester CLI.
#[derive(Parser)]
#[command(name = "harvester")]
#[command(about = "Session context aggregation and change notification")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "HARVESTER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Replay a recorded append log and a serialized document through the engine
    Replay {
        /// Append log, one JSON record per line
        #[arg(long)]
        log: PathBuf,

        /// Document tree as JSON
        #[arg(long)]
        document: PathBuf,

        /// Print engine metrics after the final snapshot
        #[arg(long)]
        metrics: bool,
    },

    /// Split a parameter value into its discrete parts
    Split {
        /// Text to split
        text: String,

        /// Minimum whitespace run after a comma (default: engine.split_min_gap)
        #[arg(long)]
        min_gap: Option<usize>,
    },
}
