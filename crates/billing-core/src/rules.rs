//! # Markup Rules and Matcher
//!
//! Decides whether a markup rule applies to a transaction and picks the
//! single winning rule among several matches.
//!
//! ## Matching Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  rules (priority DESC, created ASC)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  rule_matches(rule, ctx)   every scope null-or-equal,                   │
//! │       │                    every condition present is satisfied         │
//! │       ▼                                                                 │
//! │  count_conditions(rule)    +1 client, +1 ship option, +1 weight         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  highest score wins; ties keep the earlier rule                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Specificity Example
//! ```text
//! A: global                           14%   score 0
//! B: global, ship option 146          18%   score 1
//! C: global, ship option 146, 80-160  25%   score 2
//!
//! ship option 146, 112oz  → C
//! ship option 146, 500oz  → B   (C's weight range fails)
//! ship option 200         → A
//! ```
//!
//! Rules never stack: at most one rule prices a line.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::{BillingCategory, OrderCategory};

// =============================================================================
// Markup Type
// =============================================================================

/// How `markup_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupType {
    /// `value` is a percentage of the base amount (18 = 18%).
    Percentage,
    /// `value` is a flat amount added regardless of the base amount.
    FixedAmount,
}

impl MarkupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkupType::Percentage => "percentage",
            MarkupType::FixedAmount => "fixed_amount",
        }
    }
}

impl fmt::Display for MarkupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MarkupType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percentage" | "percent" => Ok(MarkupType::Percentage),
            "fixed_amount" | "fixed" => Ok(MarkupType::FixedAmount),
            _ => Err(ValidationError::NotAllowed {
                field: "markup_type".to_string(),
                allowed: vec!["percentage".into(), "fixed_amount".into()],
            }),
        }
    }
}

// =============================================================================
// Rule Model
// =============================================================================

/// Structured conditions attached to a rule.
///
/// An empty list behaves like an absent one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConditions {
    /// Inclusive lower bound, ounces.
    pub weight_min_oz: Option<Decimal>,
    /// Exclusive upper bound, ounces.
    pub weight_max_oz: Option<Decimal>,
    pub states: Option<Vec<String>>,
    pub countries: Option<Vec<String>>,
    pub ship_options: Option<Vec<String>>,
}

impl RuleConditions {
    #[inline]
    pub fn has_weight_bound(&self) -> bool {
        self.weight_min_oz.is_some() || self.weight_max_oz.is_some()
    }

    pub fn ship_option_list(&self) -> Option<&[String]> {
        non_empty(&self.ship_options)
    }
}

fn non_empty(list: &Option<Vec<String>>) -> Option<&[String]> {
    list.as_deref().filter(|l| !l.is_empty())
}

/// A configured markup rule.
///
/// Every `Option` scope left as `None` means "any".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupRule {
    pub id: String,
    pub name: String,
    /// `None` = applies to every client.
    pub client_id: Option<String>,
    pub billing_category: Option<BillingCategory>,
    pub fee_type: Option<String>,
    /// Only meaningful for shipment fee types.
    pub order_category: Option<OrderCategory>,
    pub ship_option_id: Option<String>,
    pub conditions: Option<RuleConditions>,
    pub markup_type: MarkupType,
    /// 18 = 18% for percentage rules; a currency amount for fixed rules.
    pub markup_value: Decimal,
    /// Higher first.
    pub priority: i32,
    pub effective_from: NaiveDate,
    /// Inclusive; `None` = open-ended.
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl MarkupRule {
    /// Active and inside the effective range on `date`.
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_from <= date
            && self.effective_to.map_or(true, |to| date <= to)
    }

    /// Markup as a fraction (0.18), or `None` for fixed-amount rules.
    pub fn percentage_fraction(&self) -> Option<Decimal> {
        match self.markup_type {
            MarkupType::Percentage => Some(self.markup_value / Decimal::ONE_HUNDRED),
            MarkupType::FixedAmount => None,
        }
    }
}

// =============================================================================
// Transaction Context
// =============================================================================

/// The attributes of one transaction that rules are matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    pub client_id: String,
    pub date: NaiveDate,
    pub fee_type: String,
    pub category: BillingCategory,
    pub order_category: Option<OrderCategory>,
    pub ship_option_id: Option<String>,
    pub weight_oz: Option<Decimal>,
    pub state: Option<String>,
    pub country: Option<String>,
}

// =============================================================================
// Matcher
// =============================================================================

/// True when every scope and every present condition of `rule` holds.
pub fn rule_matches(rule: &MarkupRule, ctx: &TransactionContext) -> bool {
    if let Some(client) = &rule.client_id {
        if client != &ctx.client_id {
            return false;
        }
    }
    if let Some(category) = rule.billing_category {
        if category != ctx.category {
            return false;
        }
    }
    if let Some(fee_type) = &rule.fee_type {
        if fee_type.trim() != ctx.fee_type.trim() {
            return false;
        }
    }
    if let Some(order_category) = rule.order_category {
        if order_category != ctx.order_category.unwrap_or_default() {
            return false;
        }
    }
    if let Some(ship_option) = &rule.ship_option_id {
        if ctx.ship_option_id.as_ref() != Some(ship_option) {
            return false;
        }
    }

    match &rule.conditions {
        Some(conditions) => conditions_hold(conditions, ctx),
        None => true,
    }
}

fn conditions_hold(conditions: &RuleConditions, ctx: &TransactionContext) -> bool {
    // Weight bounds only bite when the shipment weight is known.
    if let Some(weight) = ctx.weight_oz {
        if conditions.weight_min_oz.is_some_and(|min| weight < min) {
            return false;
        }
        if conditions.weight_max_oz.is_some_and(|max| weight >= max) {
            return false;
        }
    }

    if let Some(states) = non_empty(&conditions.states) {
        if !contains_ignore_case(states, ctx.state.as_deref()) {
            return false;
        }
    }
    if let Some(countries) = non_empty(&conditions.countries) {
        if !contains_ignore_case(countries, ctx.country.as_deref()) {
            return false;
        }
    }
    if let Some(options) = conditions.ship_option_list() {
        match ctx.ship_option_id.as_deref() {
            Some(option) if options.iter().any(|o| o == option) => {}
            _ => return false,
        }
    }

    true
}

fn contains_ignore_case(list: &[String], value: Option<&str>) -> bool {
    match value {
        Some(value) => list.iter().any(|v| v.trim().eq_ignore_ascii_case(value.trim())),
        None => false,
    }
}

/// Specificity score of a rule.
///
/// Counts client scope, the `ship_option_id` scope and a weight bound.
/// Category, fee-type and order-category scopes are filters and do not
/// count; neither do the state, country and ship-option lists.
pub fn count_conditions(rule: &MarkupRule) -> u8 {
    let mut score = 0;
    if rule.client_id.is_some() {
        score += 1;
    }
    if rule.ship_option_id.is_some() {
        score += 1;
    }
    if rule.conditions.as_ref().is_some_and(RuleConditions::has_weight_bound) {
        score += 1;
    }
    score
}

/// Picks the matching rule with the highest specificity.
///
/// `rules` must already be in [`sort_for_matching`] order; among equal
/// scores the earlier rule wins. `None` is a normal outcome.
pub fn find_matching_rule<'a>(
    rules: &'a [MarkupRule],
    ctx: &TransactionContext,
) -> Option<&'a MarkupRule> {
    let mut best: Option<(&MarkupRule, u8)> = None;

    for rule in rules.iter().filter(|r| rule_matches(r, ctx)) {
        let score = count_conditions(rule);
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((rule, score)),
        }
    }

    best.map(|(rule, _)| rule)
}

/// Sorts rules by priority DESC, then creation time ASC, then id.
pub fn sort_for_matching(rules: &mut [MarkupRule]) {
    rules.sort_by(matching_order);
}

fn matching_order(a: &MarkupRule, b: &MarkupRule) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

// =============================================================================
// Unit Tests
// =============================================================================
