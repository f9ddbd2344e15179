//! Layered error definitions
//!
//! Categorized by source: config / event / animal

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Event Errors =====
    /// Unknown event type code
    #[error("unknown event type code {code}")]
    UnknownEventType { code: i64 },

    /// Event column could not be interpreted for its event type
    #[error("invalid {column} for {event_type} event: {value:?}")]
    InvalidEventData {
        event_type: String,
        column: &'static str,
        value: String,
    },

    // ===== Animal Errors =====
    /// Animal metadata uses a reserved key
    #[error("animal '{tag}' metadata cannot use reserved key '{key}'")]
    ReservedMetaKey { tag: String, key: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid event data error
    pub fn invalid_event_data(
        event_type: impl Into<String>,
        column: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidEventData {
            event_type: event_type.into(),
            column,
            value: value.into(),
        }
    }
}
