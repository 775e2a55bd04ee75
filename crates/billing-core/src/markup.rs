//! # Markup Calculator
//!
//! Turns a base amount and (at most) one rule into markup and billed
//! amounts.
//!
//! ## Formulas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  General line                                                           │
//! │    percentage:  markup = round(base × value / 100)                      │
//! │    fixed:       markup = round(value)          (even if base < 0)       │
//! │    billed     = round(base + markup)                                    │
//! │                                                                         │
//! │  Shipment line (m = value / 100)                                        │
//! │    base_charge      = base × (1 + m)                                    │
//! │    total_charge     = base_charge + surcharge     surcharge not marked  │
//! │    insurance_charge = insurance × (1 + m)         insurance IS marked   │
//! │    billed           = round(total_charge + insurance_charge)            │
//! │                                                                         │
//! │  No rule: markup = 0, billed = base (+ surcharge + insurance)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::{Money, RoundingMode};
use crate::rules::{MarkupRule, MarkupType};
use crate::types::ShipmentCharges;

// =============================================================================
// Result Types
// =============================================================================

/// A rule that contributed to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRule {
    pub id: String,
    pub name: String,
    pub markup_type: MarkupType,
    pub markup_value: Decimal,
}

impl From<&MarkupRule> for AppliedRule {
    fn from(rule: &MarkupRule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            markup_type: rule.markup_type,
            markup_value: rule.markup_value,
        }
    }
}

/// Outcome of pricing one amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupResult {
    pub base_amount: Money,
    pub markup_amount: Money,
    pub billed_amount: Money,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    /// `round(markup / base × 100, 2)`; for reporting only.
    pub effective_percentage: Decimal,
    /// Never more than one entry: rules do not stack.
    pub applied_rules: Vec<AppliedRule>,
}

impl MarkupResult {
    /// Pass-through result: billed exactly at cost.
    pub fn unmarked(base: Money) -> Self {
        Self {
            base_amount: base,
            markup_amount: Money::zero(),
            billed_amount: base,
            rule_id: None,
            rule_name: None,
            effective_percentage: Decimal::ZERO,
            applied_rules: Vec::new(),
        }
    }
}

// =============================================================================
// General Calculator
// =============================================================================

/// Prices `base` with half-away-from-zero rounding.
///
/// ## Example
/// ```rust
/// use billing_core::markup::calculate_markup;
/// use billing_core::money::Money;
///
/// let result = calculate_markup(Money::from_cents(1000), None);
/// assert_eq!(result.billed_amount, Money::from_cents(1000));
/// assert!(result.rule_id.is_none());
/// ```
pub fn calculate_markup(base: Money, rule: Option<&MarkupRule>) -> MarkupResult {
    calculate_markup_with(base, rule, RoundingMode::default())
}

/// Prices `base` with an explicit rounding mode.
pub fn calculate_markup_with(
    base: Money,
    rule: Option<&MarkupRule>,
    mode: RoundingMode,
) -> MarkupResult {
    let Some(rule) = rule else {
        return MarkupResult::unmarked(base);
    };

    let raw_markup = match rule.markup_type {
        MarkupType::Percentage => base.scale(rule.markup_value / Decimal::ONE_HUNDRED),
        MarkupType::FixedAmount => Money::new(rule.markup_value),
    };
    let markup = raw_markup.round_cents(mode);
    let billed = (base + markup).round_cents(mode);

    MarkupResult {
        base_amount: base,
        markup_amount: markup,
        billed_amount: billed,
        rule_id: Some(rule.id.clone()),
        rule_name: Some(rule.name.clone()),
        effective_percentage: effective_percentage(base, markup, mode),
        applied_rules: vec![AppliedRule::from(rule)],
    }
}

/// Markup as a percentage of base, rounded to 2 dp; zero when base is zero.
pub fn effective_percentage(base: Money, markup: Money, mode: RoundingMode) -> Decimal {
    if base.is_zero() {
        return Decimal::ZERO;
    }
    mode.round(markup.amount() / base.amount() * Decimal::ONE_HUNDRED, 2)
}

// =============================================================================
// Shipment Calculator
// =============================================================================

/// Billed amount of a shipment line plus its display breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipmentBilling {
    pub markup_applied: Money,
    pub billed_amount: Money,
    pub charges: ShipmentCharges,
}

/// Prices a shipment line's decomposed costs.
///
/// Only `billed_amount` is authoritative. The `charges` components are
/// rounded independently for display and need not sum to it.
pub fn calculate_shipment_billing(
    base: Money,
    surcharge: Money,
    insurance: Money,
    rule: Option<&MarkupRule>,
    mode: RoundingMode,
) -> ShipmentBilling {
    let (base_charge, insurance_charge) = match rule {
        Some(rule) => match rule.markup_type {
            MarkupType::Percentage => {
                let factor = Decimal::ONE + rule.markup_value / Decimal::ONE_HUNDRED;
                (base.scale(factor), insurance.scale(factor))
            }
            MarkupType::FixedAmount => (base + Money::new(rule.markup_value), insurance),
        },
        None => (base, insurance),
    };
    let total_charge = base_charge + surcharge;
    let raw_billed = total_charge + insurance_charge;

    // No rule: billed at cost, unrounded, like any other pass-through line.
    let billed_amount = match rule {
        Some(_) => raw_billed.round_cents(mode),
        None => raw_billed,
    };

    ShipmentBilling {
        markup_applied: billed_amount - base - surcharge - insurance,
        billed_amount,
        charges: ShipmentCharges {
            base_charge: base_charge.round_cents(mode),
            total_charge: total_charge.round_cents(mode),
            insurance_charge: insurance_charge.round_cents(mode),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
