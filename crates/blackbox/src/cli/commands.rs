//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Arguments shared by `bbx error` and `bbx history`.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Record key, e.g. the error code or action name
    pub key: String,

    /// Free-form description
    #[arg(short, long)]
    pub description: Option<String>,
}

/// Which records `bbx list` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSelection {
    /// Errors and history.
    All,
    /// Errors only.
    Errors,
    /// History only.
    History,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show error records
    #[arg(long, conflicts_with = "history")]
    pub errors: bool,

    /// Only show history records
    #[arg(long)]
    pub history: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl ListCommand {
    /// The record lists selected by the flags.
    #[must_use]
    pub fn selection(&self) -> ListSelection {
        match (self.errors, self.history) {
            (true, _) => ListSelection::Errors,
            (false, true) => ListSelection::History,
            (false, false) => ListSelection::All,
        }
    }
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Build the archive without saving it
    #[arg(long)]
    pub no_download: bool,

    /// Save into this directory instead of the configured one
    #[arg(short, long, value_name = "DIR", conflicts_with = "no_download")]
    pub output: Option<PathBuf>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn list(errors: bool, history: bool) -> ListCommand {
        ListCommand {
            errors,
            history,
            json: false,
        }
    }

    #[test]
    fn test_list_selection() {
        assert_eq!(list(false, false).selection(), ListSelection::All);
        assert_eq!(list(true, false).selection(), ListSelection::Errors);
        assert_eq!(list(false, true).selection(), ListSelection::History);
    }

    #[test]
    fn test_record_command_debug() {
        let cmd = RecordCommand {
            key: "E42".to_string(),
            description: Some("disk full".to_string()),
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("E42"));
        assert!(debug_str.contains("disk full"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        assert!(format!("{cmd:?}").contains("Show"));
    }
}
