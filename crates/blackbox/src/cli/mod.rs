//! Command-line interface for blackbox.
//!
//! This module provides the CLI structure for the `bbx` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, ExportCommand, ListCommand, ListSelection, RecordCommand, StatusCommand,
};

use crate::logging::Verbosity;

/// bbx - Record errors and user history, export them for support
///
/// Keeps today's errors and recent actions in a local database and packs
/// them into a diagnostic archive on request.
#[derive(Debug, Parser)]
#[command(name = "bbx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record an error and wait until it is stored
    Error(RecordCommand),

    /// Record a user action
    History(RecordCommand),

    /// Show stored records
    List(ListCommand),

    /// Build a diagnostic archive
    Export(ExportCommand),

    /// Delete all stored records
    Clear,

    /// Show database location, mode and record counts
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
