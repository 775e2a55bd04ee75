//! # Repository Module
//!
//! Collaborator lookups backing an invoice run.
//!
//! ## What The Engine Asks For
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories per Invoice Run                         │
//! │                                                                         │
//! │  InvoiceEngine::run                                                     │
//! │       │                                                                 │
//! │       ├── db.rules().fetch_active(client, as_of)      one per client    │
//! │       ├── db.shipments().attributes_for(&ids)         chunked IN lists  │
//! │       └── db.history().invoiced_for(&ids)             chunked IN lists  │
//! │                                                                         │
//! │  After the invoice is accepted                                          │
//! │       └── db.history().record_line_items(invoice_id, &lines)            │
//! │                                                                         │
//! │  Feed loading                                                           │
//! │       └── db.transactions().list_for_period(client, from, to)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`rule::MarkupRuleRepository`] - Markup rules per client
//! - [`shipment::ShipmentRepository`] - Order-system shipment attributes
//! - [`history::InvoiceHistoryRepository`] - Previously invoiced shipment markups
//! - [`transaction::TransactionRepository`] - Provider transaction feed

pub mod history;
pub mod rule;
pub mod shipment;
pub mod transaction;

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{DbError, DbResult};

/// Parses a decimal TEXT column strictly.
pub(crate) fn parse_decimal(entity: &str, id: &str, field: &str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw.trim())
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .map_err(|e| DbError::invalid_record(entity, id, format!("{field}: {e}")))
}

/// Parses an optional decimal TEXT column, treating unparseable text as absent.
pub(crate) fn parse_decimal_lenient(raw: Option<&str>) -> Option<Decimal> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
