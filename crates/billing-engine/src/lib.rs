//! # billing-engine: Invoice Run Orchestration
//!
//! Feeds the pure markup pipeline of `billing-core` with collaborator data
//! and returns priced, reconciled, summarised invoice lines.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Billing Engine Flow                               │
//! │                                                                         │
//! │  Caller (invoice scheduler, back office)                                │
//! │       │  engine.run_with_timeout(&transactions)                         │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                 billing-engine (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   InvoiceEngine ──► RuleSource / ShipmentSource / InvoiceHistory│    │
//! │  │        │                      │                                 │    │
//! │  │        ▼                      ▼                                 │    │
//! │  │   billing-core           billing-db repositories                │    │
//! │  │   (classify, price,      (or MemorySources in tests)            │    │
//! │  │    reconcile, summary)                                          │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  InvoiceRun { line_items, summary, adjustments, unclassified }          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - The invoice run
//! - [`sources`] - Collaborator traits and implementations
//! - [`config`] - TOML + environment configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use billing_engine::{telemetry, EngineConfig, InvoiceEngine};
//! use billing_db::Database;
//!
//! telemetry::init_tracing();
//! let config = EngineConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let engine = InvoiceEngine::from_database(&db, &config);
//! let run = engine.run_with_timeout(&transactions).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod sources;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use engine::{InvoiceEngine, InvoiceRun};
pub use error::{EngineError, EngineResult};
pub use sources::{InvoiceHistory, MemorySources, RuleSource, ShipmentSource};
