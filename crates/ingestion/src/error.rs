//! Ingestion error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Event line could not be parsed
    #[error("malformed event line {line}: {message}")]
    MalformedLine {
        /// 1-based line number within the segment (0 when unknown)
        line: u64,
        /// Error message
        message: String,
    },

    /// Segment file name does not carry a `%y%m%d_%H%M%S` start time
    #[error("cannot read capture start from segment name {path:?}")]
    BadSegmentName {
        /// Segment path
        path: PathBuf,
    },

    /// CSV reader failure
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// IO failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn malformed(line: u64, message: impl Into<String>) -> Self {
        Self::MalformedLine {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn from_contract(line: u64, err: ContractError) -> Self {
        Self::malformed(line, err.to_string())
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
