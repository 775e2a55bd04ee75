//! # billing-core: Pure Markup Logic for Fulfillment Billing
//!
//! This crate is the **heart** of the billing workspace. It turns provider
//! fee records into marked-up invoice lines as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Fulfillment Billing Architecture                    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                 billing-engine (orchestration)                  │    │
//! │  │    fetch rules ──► enrich shipments ──► load history            │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │ plain in-memory records                │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ billing-core (THIS CRATE) ★                     │    │
//! │  │                                                                 │    │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐    │    │
//! │  │   │ classify │─►│  rules   │─►│  markup  │─►│  reconcile   │    │    │
//! │  │   │ FeeClass │  │ matcher  │  │  calc    │  │  summary     │    │    │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────────────┘    │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                  billing-db (Database Layer)                    │    │
//! │  │        rules, shipments, invoice history, transactions          │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Transaction, LineItem, categories)
//! - [`money`] - Decimal Money type and rounding modes
//! - [`classify`] - Fee classification into the nine invoice categories
//! - [`rules`] - Markup rules, matching and specificity
//! - [`markup`] - Markup calculator
//! - [`credit`] - Credit-to-shipment markup inheritance
//! - [`pricing`] - Batch pricing over per-client rule sets
//! - [`reconcile`] - Rounding reconciliation against formula-on-totals
//! - [`summary`] - Per-category aggregation
//! - [`policy`] - Pricing knobs
//! - [`validation`] - Rule and policy validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same transactions + same rules = bit-identical output
//! 2. **No I/O**: collaborators are the engine's job
//! 3. **Decimal Money**: no floats; rounding only where an invoice rounds
//! 4. **Never Drop a Fee**: unknown pairings land in a catch-all category
//!
//! ## Example Usage
//!
//! ```rust
//! use billing_core::classify::classify_batch;
//! use billing_core::pricing::price_batch;
//! use billing_core::reconcile::reconcile;
//! use billing_core::summary::summarize;
//! use billing_core::PricingPolicy;
//! use std::collections::BTreeMap;
//!
//! let policy = PricingPolicy::default();
//! let lines = classify_batch(&[]);
//! let priced = price_batch(lines, &BTreeMap::new(), &BTreeMap::new(), Vec::new(), &policy);
//! let reconciled = reconcile(&priced, &policy);
//! let summary = summarize(&reconciled.line_items, policy.rounding);
//! assert_eq!(summary.categories.len(), 9);
//! ```

use rust_decimal::Decimal;

// =============================================================================
// Module Declarations
// =============================================================================

pub mod classify;
pub mod credit;
pub mod error;
pub mod markup;
pub mod money;
pub mod policy;
pub mod pricing;
pub mod reconcile;
pub mod rules;
pub mod summary;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use classify::FeeClass;
pub use credit::ShipmentMarkup;
pub use error::{CoreError, CoreResult, ValidationError};
pub use markup::MarkupResult;
pub use money::{Money, RoundingMode};
pub use policy::PricingPolicy;
pub use reconcile::{Reconciliation, ReconciliationAdjustment};
pub use rules::{MarkupRule, MarkupType, RuleConditions, TransactionContext};
pub use summary::{CategorySummary, Summary};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Max distance between |credit| and a shipment's base amount ($0.01).
pub const DEFAULT_CREDIT_MATCH_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Smallest reconciliation diff worth applying ($0.005).
///
/// Absorbs representation noise around the one-cent boundary.
pub const DEFAULT_RECONCILE_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Reconciliation diffs above this are flagged as data-quality alerts ($0.05).
pub const DEFAULT_ALERT_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Lowest accepted percentage markup (a full discount).
pub const MIN_PERCENTAGE_MARKUP: Decimal = Decimal::from_parts(100, 0, 0, true, 0);

/// Highest accepted percentage markup.
pub const MAX_PERCENTAGE_MARKUP: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
