//! # billing-db: Database Layer for Fulfillment Billing
//!
//! SQLite persistence for the collaborators an invoice run reads from:
//! markup rules, shipment attributes, previously invoiced shipments and the
//! provider transaction feed.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Billing Data Flow                                │
//! │                                                                         │
//! │  InvoiceEngine (billing-engine)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     billing-db (THIS CRATE)                     │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────────┐   ┌────────────┐  │    │
//! │  │   │   Database    │    │   Repositories     │   │ Migrations │  │    │
//! │  │   │   (pool.rs)   │    │                    │   │ (embedded) │  │    │
//! │  │   │               │    │ MarkupRuleRepo     │   │            │  │    │
//! │  │   │ SqlitePool    │◄───│ ShipmentRepo       │   │ 001_init   │  │    │
//! │  │   │ WAL mode      │    │ InvoiceHistoryRepo │   │            │  │    │
//! │  │   │               │    │ TransactionRepo    │   │            │  │    │
//! │  │   └───────────────┘    └────────────────────┘   └────────────┘  │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (billing.db)                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use billing_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("billing.db")).await?;
//! let rules = db.rules().fetch_active("client-1", as_of).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::history::InvoiceHistoryRepository;
pub use repository::rule::MarkupRuleRepository;
pub use repository::shipment::ShipmentRepository;
pub use repository::transaction::TransactionRepository;
