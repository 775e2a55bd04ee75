//! # Rounding Reconciliation
//!
//! Makes per-line billed amounts add up to the "formula on totals" figure
//! that exported statements show.
//!
//! ## The Discrepancy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Three shipping lines at 18%: 10.005, 10.005, 10.00                     │
//! │                                                                         │
//! │  Per line:   11.81 + 11.81 + 11.80            = 35.42                   │
//! │  On totals:  round(30.01 × 1.18) = round(35.4118) = 35.41               │
//! │                                                                         │
//! │  diff = -0.01 → applied to the largest line: 11.80 + 11.81 + 11.80      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Groups
//! - Shipping: `base × (1+m) + surcharge + insurance × (1+m)`
//! - Additional Services: `base × (1+m)`
//!
//! Groups are keyed by `(category, m)` using the nominal rule fraction.
//! Pick Fees, B2B Fees and every other category are left alone, as are
//! lines without a percentage (fixed rules) and lines billed at cost.
//!
//! The pass returns a new vector and never touches its input. Running it on
//! its own output changes nothing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::Money;
use crate::policy::PricingPolicy;
use crate::types::{BillingCategory, LineItem, MarkupSource};

/// One correction made by the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationAdjustment {
    pub category: BillingCategory,
    pub markup_percentage: Decimal,
    /// Formula-on-totals amount.
    pub expected: Money,
    /// Sum of the group's billed amounts before the correction.
    pub actual: Money,
    pub diff: Money,
    /// Line that absorbed the diff.
    pub line_id: String,
    pub exceeds_alert_threshold: bool,
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub line_items: Vec<LineItem>,
    pub adjustments: Vec<ReconciliationAdjustment>,
}

/// Categories the pass applies to.
pub fn is_reconciled_category(category: BillingCategory) -> bool {
    matches!(
        category,
        BillingCategory::Shipping | BillingCategory::AdditionalServices
    )
}

fn group_key(line: &LineItem) -> Option<(BillingCategory, Decimal)> {
    if !is_reconciled_category(line.category) || line.markup_source != MarkupSource::Rule {
        return None;
    }
    line.markup_percentage.map(|m| (line.category, m.normalize()))
}

/// Formula-on-totals for a group, unrounded.
fn formula_on_totals(category: BillingCategory, m: Decimal, group: &[&LineItem]) -> Money {
    let factor = Decimal::ONE + m;
    let base: Money = group.iter().map(|l| l.base_amount).sum();

    match category {
        BillingCategory::Shipping => {
            let surcharge: Money = group.iter().filter_map(|l| l.surcharge).sum();
            let insurance: Money = group.iter().filter_map(|l| l.insurance_cost).sum();
            base.scale(factor) + surcharge + insurance.scale(factor)
        }
        _ => base.scale(factor),
    }
}

/// Reconciles every eligible group.
pub fn reconcile(items: &[LineItem], policy: &PricingPolicy) -> Reconciliation {
    let mode = policy.rounding;

    let mut groups: BTreeMap<(BillingCategory, Decimal), Vec<usize>> = BTreeMap::new();
    for (index, line) in items.iter().enumerate() {
        if let Some(key) = group_key(line) {
            groups.entry(key).or_default().push(index);
        }
    }

    let mut line_items = items.to_vec();
    let mut adjustments = Vec::new();

    for ((category, m), indices) in groups {
        let group: Vec<&LineItem> = indices.iter().map(|&i| &items[i]).collect();

        let expected = formula_on_totals(category, m, &group).round_cents(mode);
        let actual: Money = group.iter().map(|l| l.billed_amount).sum();
        let diff = expected - actual;

        if diff.amount().abs() < policy.reconcile_tolerance {
            continue;
        }

        // Largest absolute billed amount; the earliest line wins ties.
        let mut target = indices[0];
        for &i in &indices[1..] {
            if items[i].billed_amount.abs() > items[target].billed_amount.abs() {
                target = i;
            }
        }

        let line = &mut line_items[target];
        line.billed_amount = (line.billed_amount + diff).round_cents(mode);
        line.markup_applied += diff;

        adjustments.push(ReconciliationAdjustment {
            category,
            markup_percentage: m,
            expected,
            actual,
            diff,
            line_id: line.id.clone(),
            exceeds_alert_threshold: diff.amount().abs() > policy.alert_threshold,
        });
    }

    Reconciliation {
        line_items,
        adjustments,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
