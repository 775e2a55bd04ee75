//! # Error Types
//!
//! Domain-specific error types for billing-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  billing-core errors (this file)                                        │
//! │  ├── CoreError        - Rules or amounts that cannot be priced          │
//! │  └── ValidationError  - Field-level input failures                      │
//! │                                                                         │
//! │  billing-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  billing-engine errors (separate crate)                                 │
//! │  └── EngineError      - Config, lookups, timeouts                       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Note
//! Pricing itself never fails for valid numeric input. These errors guard
//! the edges: rules entering the system and configuration values.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A markup rule cannot be used for pricing.
    ///
    /// ## When This Occurs
    /// - Weight range is inverted (min >= max)
    /// - Effective range ends before it starts
    /// - Percentage outside the accepted band
    #[error("Invalid markup rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },

    /// An amount could not be interpreted.
    ///
    /// ## When This Occurs
    /// - Strict parsing of configuration values (tolerances, thresholds)
    ///
    /// Transaction costs never produce this error; they are coerced to zero.
    #[error("Invalid amount for {field}: '{value}'")]
    InvalidAmount { field: String, value: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., storage reference, date range).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
