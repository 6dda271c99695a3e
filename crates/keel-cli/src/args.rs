//! Command-line argument definitions for the Keel CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments control the session and output paths,
//! configuration file selection, and logging verbosity.

use clap::Parser;

/// Replays an editing session against the Keel layout engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the session file (TOML)
    #[arg(help = "Path to the session file")]
    pub input: String,

    /// Path to the output positions file (TOML)
    #[arg(short, long, default_value = "positions.toml")]
    pub output: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
