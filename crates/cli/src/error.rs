//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Neither a config file nor a tube count was given
    #[error("No colony layout: pass --config or --n-tubes")]
    MissingLayout,

    /// Every input segment was empty or unreadable
    #[error("No events found in {count} input file(s)")]
    NoEvents { count: usize },

    /// Output file could not be written
    #[error("Failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn output(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }
}
