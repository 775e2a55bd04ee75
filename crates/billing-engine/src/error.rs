//! # Engine Error Types
//!
//! Error types for invoice runs and engine configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Configuration  │  │  Collaborators  │  │     Run                 │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  Config         │  │  Db             │  │  Timeout                │  │
//! │  │  Io             │  │  Source         │  │  Core                   │  │
//! │  │  Toml           │  │                 │  │                         │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pricing pipeline itself never fails for valid numeric input; every
//! error here comes from loading configuration or from a collaborator.

use thiserror::Error;

use billing_core::CoreError;
use billing_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    Config(String),

    /// Config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for `EngineConfig`.
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Database collaborator failed.
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    /// A non-database collaborator failed.
    #[error("Source '{source_name}' failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    // =========================================================================
    // Run Errors
    // =========================================================================
    /// Domain error (invalid rule, invalid amount).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The run did not finish inside the configured timeout.
    #[error("Invoice run timed out after {0} seconds")]
    Timeout(u64),
}

impl EngineError {
    /// Creates a Source error.
    pub fn source_failed(source_name: impl Into<String>, message: impl ToString) -> Self {
        EngineError::Source {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}
