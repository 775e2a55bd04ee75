//! # Summary Aggregator
//!
//! Rolls line items up into the nine invoice categories.
//!
//! ```text
//! category             count   subtotal (base + surcharge)   markup   total
//! ─────────────────    ─────   ───────────────────────────   ──────   ─────
//! Fulfillment            ...
//! Shipping               ...
//! ...                    (all nine, always, in invoice order)
//! ─────────────────
//! grand totals           rounded once at the end
//! ```

use serde::{Deserialize, Serialize};

use crate::money::{Money, RoundingMode};
use crate::types::{BillingCategory, LineItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: BillingCategory,
    pub count: usize,
    pub subtotal: Money,
    pub markup: Money,
    pub total: Money,
}

impl CategorySummary {
    fn empty(category: BillingCategory) -> Self {
        Self {
            category,
            count: 0,
            subtotal: Money::zero(),
            markup: Money::zero(),
            total: Money::zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// All nine categories in invoice order.
    pub categories: Vec<CategorySummary>,
    pub line_count: usize,
    pub subtotal: Money,
    pub markup: Money,
    pub total: Money,
}

impl Summary {
    pub fn category(&self, category: BillingCategory) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Aggregates line items.
pub fn summarize(items: &[LineItem], mode: RoundingMode) -> Summary {
    let mut categories: Vec<CategorySummary> = BillingCategory::ALL
        .iter()
        .map(|c| CategorySummary::empty(*c))
        .collect();

    for item in items {
        let Some(slot) = categories.iter_mut().find(|c| c.category == item.category) else {
            continue;
        };
        slot.count += 1;
        slot.subtotal += item.base_amount + item.surcharge.unwrap_or_default();
        slot.markup += item.markup_applied;
        slot.total += item.billed_amount;
    }

    let subtotal: Money = categories.iter().map(|c| c.subtotal).sum();
    let markup: Money = categories.iter().map(|c| c.markup).sum();
    let total: Money = categories.iter().map(|c| c.total).sum();

    for c in &mut categories {
        c.subtotal = c.subtotal.round_cents(mode);
        c.markup = c.markup.round_cents(mode);
        c.total = c.total.round_cents(mode);
    }

    Summary {
        categories,
        line_count: items.len(),
        subtotal: subtotal.round_cents(mode),
        markup: markup.round_cents(mode),
        total: total.round_cents(mode),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_batch;
    use crate::classify::tests::tx;
    use crate::pricing::price_batch;
    use crate::policy::PricingPolicy;
    use crate::rules::tests::rule;
    use crate::types::ShippingCostBreakdown;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    #[test]
    fn test_empty_summary_has_all_categories() {
        let summary = summarize(&[], RoundingMode::default());
        assert_eq!(summary.categories.len(), 9);
        let order: Vec<_> = summary.categories.iter().map(|c| c.category).collect();
        assert_eq!(order, BillingCategory::ALL.to_vec());
        assert!(summary.total.is_zero());
        assert_eq!(summary.line_count, 0);
    }

    #[test]
    fn test_category_totals() {
        let mut shipment = tx("1", "Shipment", "Shipping", dec!(12));
        shipment.shipping_costs = Some(ShippingCostBreakdown {
            base_cost: Money::from_cents(1000),
            surcharge: Money::from_cents(200),
            insurance_cost: Money::zero(),
        });
        let transactions = vec![
            shipment,
            tx("2", "FC", "Storage Fee", dec!(5)),
            tx("3", "FC", "Storage Fee", dec!(2.50)),
            tx("4", "TicketNumber", "Credit", dec!(-3)),
        ];
        let lines = price_batch(
            classify_batch(&transactions),
            &BTreeMap::from([("client-1".to_string(), vec![rule("r10", dec!(10))])]),
            &BTreeMap::new(),
            Vec::new(),
            &PricingPolicy::default(),
        );

        let summary = summarize(&lines, RoundingMode::default());

        let shipping = summary.category(BillingCategory::Shipping).unwrap();
        assert_eq!(shipping.count, 1);
        assert_eq!(shipping.subtotal, Money::from_cents(1200));
        assert_eq!(shipping.markup, Money::from_cents(100));
        assert_eq!(shipping.total, Money::from_cents(1300));

        let storage = summary.category(BillingCategory::Storage).unwrap();
        assert_eq!(storage.count, 2);
        assert_eq!(storage.subtotal, Money::from_cents(750));
        assert_eq!(storage.total, Money::from_cents(825));

        let credits = summary.category(BillingCategory::Credits).unwrap();
        assert_eq!(credits.total, Money::from_cents(-330));

        assert_eq!(summary.line_count, 4);
        assert_eq!(summary.subtotal, Money::from_cents(1650));
        assert_eq!(summary.total, Money::from_cents(1795));
    }

    #[test]
    fn test_totals_rounded_once() {
        let lines = classify_batch(&[
            tx("1", "Return", "Return Fee", dec!(0.004)),
            tx("2", "Return", "Return Fee", dec!(0.004)),
        ]);
        let summary = summarize(&lines, RoundingMode::default());
        // 0.008 → 0.01, not 0.00 + 0.00
        assert_eq!(summary.total, Money::from_cents(1));
    }
}
