//! # Credit-to-Shipment Markup Inheritance
//!
//! A shipping credit is discounted at the rate its shipment was billed at,
//! not at whatever rule a bare "Credit" fee matches today.
//!
//! ## Lookup Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  credit (reference = Shipment S, base = -50.00)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. shipment lines priced in this batch    S → 50.00 @ 20%              │
//! │       │ |−50.00| within 0.01 of 50.00?  yes → inherit 20%               │
//! │       ▼ no                                                              │
//! │  2. previously invoiced shipments          S → ...                      │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  3. fall back to ordinary rule matching                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::{Money, RoundingMode};
use crate::types::{LineItem, MarkupSource};

/// How a shipment was billed, as needed by its credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentMarkup {
    pub shipment_id: String,
    pub base_amount: Money,
    /// Fraction (0.20 for 20%).
    pub markup_percentage: Decimal,
    pub rule_id: Option<String>,
}

impl ShipmentMarkup {
    /// Builds an entry from a priced shipment line.
    ///
    /// Lines priced by a fixed-amount rule carry no percentage and cannot
    /// be inherited from.
    pub fn from_line(line: &LineItem) -> Option<Self> {
        if !line.category.is_shipment() {
            return None;
        }
        Some(Self {
            shipment_id: line.reference_id.clone(),
            base_amount: line.base_amount,
            markup_percentage: line.markup_percentage?,
            rule_id: line.rule_id.clone(),
        })
    }
}

/// Shipment markups keyed by shipment id, split by provenance.
#[derive(Debug, Clone, Default)]
pub struct ShipmentMarkupIndex {
    in_batch: BTreeMap<String, ShipmentMarkup>,
    history: BTreeMap<String, ShipmentMarkup>,
}

impl ShipmentMarkupIndex {
    /// Indexes priced shipment lines. The first line for a shipment wins.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a LineItem>) -> Self {
        let mut in_batch = BTreeMap::new();
        for markup in lines.into_iter().filter_map(ShipmentMarkup::from_line) {
            in_batch.entry(markup.shipment_id.clone()).or_insert(markup);
        }
        Self {
            in_batch,
            history: BTreeMap::new(),
        }
    }

    /// Adds previously invoiced shipments as the second lookup tier.
    pub fn with_history(mut self, history: impl IntoIterator<Item = ShipmentMarkup>) -> Self {
        for markup in history {
            self.history.entry(markup.shipment_id.clone()).or_insert(markup);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.in_batch.len() + self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_batch.is_empty() && self.history.is_empty()
    }

    /// Finds the shipment a credit of `credit_base` should inherit from.
    pub fn find(
        &self,
        shipment_id: &str,
        credit_base: Money,
        tolerance: Decimal,
    ) -> Option<&ShipmentMarkup> {
        let amount = credit_base.abs();
        [&self.in_batch, &self.history]
            .into_iter()
            .filter_map(|tier| tier.get(shipment_id))
            .find(|markup| markup.base_amount.approx_eq(amount, tolerance))
    }
}

/// Prices a credit line at its shipment's markup.
///
/// The sign follows the credit: a -50.00 credit at 20% gets -10.00 markup.
pub fn apply_inherited_markup(
    mut line: LineItem,
    shipment: &ShipmentMarkup,
    mode: RoundingMode,
) -> LineItem {
    let markup = line
        .base_amount
        .scale(shipment.markup_percentage)
        .round_cents(mode);

    line.markup_applied = markup;
    line.billed_amount = (line.base_amount + markup).round_cents(mode);
    line.markup_percentage = Some(shipment.markup_percentage);
    line.rule_id = shipment.rule_id.clone();
    line.rule_name = None;
    line.markup_source = MarkupSource::InheritedFromShipment;
    line
}

// =============================================================================
// Unit Tests
// =============================================================================
