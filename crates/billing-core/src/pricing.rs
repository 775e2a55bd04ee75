//! # Batch Pricing
//!
//! Prices a batch of classified line items against per-client rule sets.
//! All collaborator data (rules, shipment attributes, invoice history) is
//! handed in already fetched; this module does no I/O.
//!
//! ## Two Passes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pass 1: every non-credit line                                          │
//! │          context → find_matching_rule → calculator                      │
//! │                           │                                             │
//! │                           ▼                                             │
//! │          ShipmentMarkupIndex (priced shipment lines + history)          │
//! │                           │                                             │
//! │  Pass 2: credit lines     ▼                                             │
//! │          shipment credit matching a known shipment → inherit markup     │
//! │          anything else → context → find_matching_rule → calculator      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Output order equals input order.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::credit::{apply_inherited_markup, ShipmentMarkup, ShipmentMarkupIndex};
use crate::markup::{calculate_markup_with, calculate_shipment_billing};
use crate::money::Money;
use crate::policy::PricingPolicy;
use crate::rules::{find_matching_rule, MarkupRule, MarkupType, TransactionContext};
use crate::types::{
    BillingCategory, FeeDetails, LineItem, MarkupSource, ReferenceType, ShipmentAttributes,
};

// =============================================================================
// Batch Helpers
// =============================================================================

/// Earliest transaction date per client; rules are fetched as of this date.
pub fn earliest_dates(lines: &[LineItem]) -> BTreeMap<String, NaiveDate> {
    let mut dates: BTreeMap<String, NaiveDate> = BTreeMap::new();
    for line in lines {
        dates
            .entry(line.client_id.clone())
            .and_modify(|d| *d = (*d).min(line.transaction_date))
            .or_insert(line.transaction_date);
    }
    dates
}

/// Shipment ids referenced by any line (shipment fees and shipment credits).
pub fn shipment_ids(lines: &[LineItem]) -> BTreeSet<String> {
    lines
        .iter()
        .filter(|l| l.reference_type == ReferenceType::Shipment)
        .map(|l| l.reference_id.clone())
        .collect()
}

/// Shipment ids referenced by credits; these need invoice history.
pub fn credited_shipment_ids(lines: &[LineItem]) -> BTreeSet<String> {
    lines
        .iter()
        .filter(|l| l.is_shipment_credit())
        .map(|l| l.reference_id.clone())
        .collect()
}

/// Builds the matching context of a line, enriched with shipment data.
pub fn build_context(line: &LineItem, attributes: Option<&ShipmentAttributes>) -> TransactionContext {
    let detail_order_category = match &line.details {
        FeeDetails::Shipping(shipping) => Some(shipping.order_category),
        _ => None,
    };

    TransactionContext {
        client_id: line.client_id.clone(),
        date: line.transaction_date,
        fee_type: line.fee_type.trim().to_string(),
        category: line.category,
        order_category: attributes
            .and_then(|a| a.order_category)
            .or(detail_order_category),
        ship_option_id: attributes.and_then(|a| a.ship_option_id.clone()),
        weight_oz: attributes.and_then(|a| a.weight_oz),
        state: attributes.and_then(|a| a.state.clone()),
        country: attributes.and_then(|a| a.country.clone()),
    }
}

// =============================================================================
// Line Pricing
// =============================================================================

/// Prices one line with the given rule (or none).
pub fn price_line(mut line: LineItem, rule: Option<&MarkupRule>, policy: &PricingPolicy) -> LineItem {
    let mode = policy.rounding;

    if line.category.is_shipment() {
        let billing = calculate_shipment_billing(
            line.base_amount,
            line.surcharge.unwrap_or_default(),
            line.insurance_cost.unwrap_or_default(),
            rule,
            mode,
        );
        line.markup_applied = billing.markup_applied;
        line.billed_amount = billing.billed_amount;
        line.shipment_charges = Some(billing.charges);
    } else {
        let result = calculate_markup_with(line.base_amount, rule, mode);
        line.markup_applied = result.markup_amount;
        line.billed_amount = result.billed_amount;
        line.shipment_charges = None;
    }

    match rule {
        Some(rule) => {
            line.markup_percentage = rule.percentage_fraction();
            line.rule_id = Some(rule.id.clone());
            line.rule_name = Some(rule.name.clone());
            line.markup_source = MarkupSource::Rule;
        }
        None => {
            line.markup_percentage = Some(rust_decimal::Decimal::ZERO);
            line.rule_id = None;
            line.rule_name = None;
            line.markup_source = MarkupSource::None;
        }
    }
    line
}

fn match_and_price(
    line: LineItem,
    rules: &[MarkupRule],
    attributes: &BTreeMap<String, ShipmentAttributes>,
    policy: &PricingPolicy,
) -> LineItem {
    let shipment = match line.reference_type {
        ReferenceType::Shipment => attributes.get(&line.reference_id),
        _ => None,
    };
    let ctx = build_context(&line, shipment);
    let mut rule = find_matching_rule(rules, &ctx);

    if line.category == BillingCategory::Credits && !policy.fixed_markup_on_credits {
        if let Some(r) = rule.filter(|r| r.markup_type == MarkupType::FixedAmount) {
            debug!(line_id = %line.id, rule_id = %r.id, "Fixed markup not applied to credit");
            rule = None;
        }
    }

    price_line(line, rule, policy)
}

// =============================================================================
// Batch Pricing
// =============================================================================

/// Prices a whole batch.
///
/// `rules_by_client` holds each client's rule set in matching order; a
/// client without an entry is priced at cost.
pub fn price_batch(
    lines: Vec<LineItem>,
    rules_by_client: &BTreeMap<String, Vec<MarkupRule>>,
    attributes: &BTreeMap<String, ShipmentAttributes>,
    history: Vec<ShipmentMarkup>,
    policy: &PricingPolicy,
) -> Vec<LineItem> {
    // Pass 1: everything but credits.
    let priced: Vec<LineItem> = lines
        .into_iter()
        .map(|line| {
            if line.category == BillingCategory::Credits {
                line
            } else {
                let rules = client_rules(rules_by_client, &line.client_id);
                match_and_price(line, rules, attributes, policy)
            }
        })
        .collect();

    let index = ShipmentMarkupIndex::from_lines(
        priced.iter().filter(|l| l.category != BillingCategory::Credits),
    )
    .with_history(history);

    // Pass 2: credits.
    priced
        .into_iter()
        .map(|line| {
            if line.category != BillingCategory::Credits {
                return line;
            }
            if line.is_shipment_credit() {
                if let Some(shipment) =
                    index.find(&line.reference_id, line.base_amount, policy.credit_match_tolerance)
                {
                    debug!(
                        line_id = %line.id,
                        shipment_id = %shipment.shipment_id,
                        markup_percentage = %shipment.markup_percentage,
                        "Credit inherits shipment markup"
                    );
                    return apply_inherited_markup(line, shipment, policy.rounding);
                }
            }
            let rules = client_rules(rules_by_client, &line.client_id);
            match_and_price(line, rules, attributes, policy)
        })
        .collect()
}

fn client_rules<'a>(
    rules_by_client: &'a BTreeMap<String, Vec<MarkupRule>>,
    client_id: &str,
) -> &'a [MarkupRule] {
    rules_by_client
        .get(client_id)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Sum of billed amounts (unrounded).
pub fn total_billed(lines: &[LineItem]) -> Money {
    lines.iter().map(|l| l.billed_amount).sum()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_batch;
    use crate::classify::tests::tx;
    use crate::rules::tests::rule;
    use crate::rules::RuleConditions;
    use crate::types::Transaction;
    use rust_decimal_macros::dec;

    fn rules_for(client: &str, rules: Vec<MarkupRule>) -> BTreeMap<String, Vec<MarkupRule>> {
        BTreeMap::from([(client.to_string(), rules)])
    }

    fn shipping_tx(id: &str, cost: rust_decimal::Decimal) -> Transaction {
        let mut t = tx(id, "Shipment", "Shipping", cost);
        t.reference_id = format!("S-{}", id);
        t
    }

    fn attrs(shipment_id: &str, option: &str, weight: rust_decimal::Decimal) -> ShipmentAttributes {
        ShipmentAttributes {
            shipment_id: shipment_id.to_string(),
            ship_option_id: Some(option.to_string()),
            weight_oz: Some(weight),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_rule_pass_through() {
        let lines = classify_batch(&[
            tx("1", "Shipment", "Per Pick Fee", dec!(0.333)),
            shipping_tx("2", dec!(10.005)),
        ]);
        let priced = price_batch(
            lines.clone(),
            &BTreeMap::new(),
            &BTreeMap::new(),
            Vec::new(),
            &PricingPolicy::default(),
        );

        for (before, after) in lines.iter().zip(&priced) {
            assert_eq!(after.billed_amount, before.base_amount);
            assert!(after.markup_applied.is_zero());
            assert_eq!(after.markup_source, MarkupSource::None);
        }
    }

    #[test]
    fn test_specificity_through_enrichment() {
        let a = rule("A", dec!(14));
        let b = MarkupRule {
            ship_option_id: Some("146".to_string()),
            ..rule("B", dec!(18))
        };
        let c = MarkupRule {
            ship_option_id: Some("146".to_string()),
            conditions: Some(RuleConditions {
                weight_min_oz: Some(dec!(80)),
                weight_max_oz: Some(dec!(160)),
                ..Default::default()
            }),
            ..rule("C", dec!(25))
        };
        let rules = rules_for("client-1", vec![a, b, c]);

        let lines = classify_batch(&[
            shipping_tx("1", dec!(10)),
            shipping_tx("2", dec!(10)),
            shipping_tx("3", dec!(10)),
        ]);
        let attributes = BTreeMap::from([
            ("S-1".to_string(), attrs("S-1", "146", dec!(112))),
            ("S-2".to_string(), attrs("S-2", "146", dec!(500))),
            ("S-3".to_string(), attrs("S-3", "200", dec!(112))),
        ]);

        let priced = price_batch(lines, &rules, &attributes, Vec::new(), &PricingPolicy::default());
        let ids: Vec<_> = priced.iter().map(|l| l.rule_id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["C", "B", "A"]);
        assert_eq!(priced[0].billed_amount, Money::from_cents(1250));
        assert_eq!(priced[1].markup_percentage, Some(dec!(0.18)));
    }

    #[test]
    fn test_credit_inheritance_in_batch() {
        let credit_rule = MarkupRule {
            fee_type: Some("Credit".to_string()),
            ..rule("credit-rule", dec!(5))
        };
        let shipping_rule = MarkupRule {
            fee_type: Some("Shipping".to_string()),
            ..rule("ship-20", dec!(20))
        };
        let rules = rules_for("client-1", vec![credit_rule, shipping_rule]);

        let mut credit = tx("c", "Shipment", "Credit", dec!(-50.00));
        credit.reference_id = "S-1".to_string();
        // Credit listed first; inheritance must still see the shipment.
        let lines = classify_batch(&[credit, shipping_tx("1", dec!(50.00))]);

        let priced = price_batch(lines, &rules, &BTreeMap::new(), Vec::new(), &PricingPolicy::default());
        let credit = &priced[0];
        assert_eq!(credit.markup_applied, Money::from_cents(-1000));
        assert_eq!(credit.billed_amount, Money::from_cents(-6000));
        assert_eq!(credit.rule_id.as_deref(), Some("ship-20"));
        assert_eq!(credit.markup_source, MarkupSource::InheritedFromShipment);
    }

    #[test]
    fn test_credit_inherits_from_history() {
        let mut credit = tx("c", "Shipment", "Credit", dec!(-40.00));
        credit.reference_id = "S-OLD".to_string();
        let history = vec![ShipmentMarkup {
            shipment_id: "S-OLD".to_string(),
            base_amount: Money::from_cents(4000),
            markup_percentage: dec!(0.15),
            rule_id: Some("old-rule".to_string()),
        }];

        let priced = price_batch(
            classify_batch(&[credit]),
            &BTreeMap::new(),
            &BTreeMap::new(),
            history,
            &PricingPolicy::default(),
        );
        assert_eq!(priced[0].billed_amount, Money::from_cents(-4600));
        assert_eq!(priced[0].rule_id.as_deref(), Some("old-rule"));
    }

    #[test]
    fn test_unmatched_credit_falls_back_to_rules() {
        let credit_rule = MarkupRule {
            fee_type: Some("Credit".to_string()),
            ..rule("credit-rule", dec!(5))
        };
        let rules = rules_for("client-1", vec![credit_rule]);

        let mut credit = tx("c", "Shipment", "Credit", dec!(-30.00));
        credit.reference_id = "S-1".to_string();
        // Shipment exists but amounts differ by more than the tolerance.
        let lines = classify_batch(&[shipping_tx("1", dec!(50.00)), credit]);

        let priced = price_batch(lines, &rules, &BTreeMap::new(), Vec::new(), &PricingPolicy::default());
        assert_eq!(priced[1].rule_id.as_deref(), Some("credit-rule"));
        assert_eq!(priced[1].markup_source, MarkupSource::Rule);
        assert_eq!(priced[1].billed_amount, Money::from_cents(-3150));
    }

    #[test]
    fn test_fixed_markup_on_credits_switch() {
        let fixed = MarkupRule {
            markup_type: MarkupType::FixedAmount,
            fee_type: Some("Credit".to_string()),
            ..rule("fixed", dec!(2))
        };
        let rules = rules_for("client-1", vec![fixed]);
        let lines = classify_batch(&[tx("c", "TicketNumber", "Credit", dec!(-10))]);

        let on = price_batch(lines.clone(), &rules, &BTreeMap::new(), Vec::new(), &PricingPolicy::default());
        assert_eq!(on[0].billed_amount, Money::from_cents(-800));
        assert_eq!(on[0].markup_percentage, None);

        let policy = PricingPolicy {
            fixed_markup_on_credits: false,
            ..PricingPolicy::default()
        };
        let off = price_batch(lines, &rules, &BTreeMap::new(), Vec::new(), &policy);
        assert_eq!(off[0].billed_amount, Money::from_cents(-1000));
        assert_eq!(off[0].markup_source, MarkupSource::None);
    }

    #[test]
    fn test_client_rules_are_isolated() {
        let rules = rules_for("client-1", vec![rule("c1", dec!(10))]);
        let mut other = tx("1", "Shipment", "Per Pick Fee", dec!(1));
        other.client_id = "client-2".to_string();

        let priced = price_batch(
            classify_batch(&[other]),
            &rules,
            &BTreeMap::new(),
            Vec::new(),
            &PricingPolicy::default(),
        );
        assert!(priced[0].rule_id.is_none());
    }

    #[test]
    fn test_determinism() {
        let rules = rules_for(
            "client-1",
            vec![rule("A", dec!(14)), MarkupRule {
                ship_option_id: Some("146".to_string()),
                ..rule("B", dec!(18))
            }],
        );
        let mut credit = tx("c", "Shipment", "Credit", dec!(-10.005));
        credit.reference_id = "S-1".to_string();
        let transactions = vec![
            shipping_tx("1", dec!(10.005)),
            shipping_tx("2", dec!(7.77)),
            tx("3", "FC", "Storage Fee", dec!(3.333)),
            credit,
        ];
        let attributes = BTreeMap::from([("S-1".to_string(), attrs("S-1", "146", dec!(12)))]);

        let run = || {
            price_batch(
                classify_batch(&transactions),
                &rules,
                &attributes,
                Vec::new(),
                &PricingPolicy::default(),
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_batch_helpers() {
        let mut early = tx("1", "Shipment", "Shipping", dec!(1));
        early.charge_date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let mut credit = tx("2", "Shipment", "Credit", dec!(-1));
        credit.reference_id = "S-9".to_string();
        let lines = classify_batch(&[early, credit, tx("3", "FC", "Storage Fee", dec!(1))]);

        assert_eq!(
            earliest_dates(&lines).get("client-1"),
            Some(&NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
        );
        assert_eq!(shipment_ids(&lines).len(), 2);
        assert_eq!(
            credited_shipment_ids(&lines).into_iter().collect::<Vec<_>>(),
            vec!["S-9".to_string()]
        );
    }
}
