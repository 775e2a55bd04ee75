//! # Invoice Engine
//!
//! Drives one invoice run: classifies the transactions, gathers what the
//! pure pipeline needs from the collaborators, then prices, reconciles and
//! summarises.
//!
//! ## Run Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        InvoiceEngine::run                               │
//! │                                                                         │
//! │  transactions                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  classify_batch ── zero-cost rows dropped, unknown pairings warned      │
//! │       │                                                                 │
//! │       ├──────────────────────┬───────────────────────┐                  │
//! │       ▼                      ▼                       ▼                  │
//! │  shipment attributes    invoice history        rules per client         │
//! │  (500-id chunks,        (credited shipments,   (as of the client's      │
//! │   concurrent)            500-id chunks)         earliest date)          │
//! │       │                      │                       │                  │
//! │       └──────────────────────┴───────────────────────┘                  │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  price_batch ── non-credits first, then credits (inherit or match)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  reconcile ── alert-level diffs logged as warnings                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  summarize ── nine categories + grand totals                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The three lookups run concurrently with each other. Output depends only
//! on the transactions and what the collaborators return.

use futures_util::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use billing_core::classify::classify_batch;
use billing_core::pricing::{credited_shipment_ids, earliest_dates, price_batch, shipment_ids};
use billing_core::reconcile::reconcile;
use billing_core::rules::sort_for_matching;
use billing_core::summary::summarize;
use billing_core::{
    FeeDetails, LineItem, MarkupRule, PricingPolicy, ReconciliationAdjustment, ShipmentAttributes,
    ShipmentMarkup, Summary, Transaction,
};
use billing_db::Database;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::sources::{InvoiceHistory, RuleSource, ShipmentSource};

// =============================================================================
// Run Output
// =============================================================================

/// Everything one invoice run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceRun {
    /// Priced and reconciled lines, in transaction order.
    pub line_items: Vec<LineItem>,
    pub summary: Summary,
    /// Corrections made by reconciliation, alert-level ones flagged.
    pub adjustments: Vec<ReconciliationAdjustment>,
    /// Ids of lines billed through the catch-all.
    pub unclassified: Vec<String>,
}

impl InvoiceRun {
    /// Adjustments large enough to be reported as data-quality issues.
    pub fn alerts(&self) -> impl Iterator<Item = &ReconciliationAdjustment> {
        self.adjustments.iter().filter(|a| a.exceeds_alert_threshold)
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Invoice run orchestrator.
///
/// ## Usage
/// ```rust,ignore
/// let config = EngineConfig::load(None)?;
/// let db = Database::new(config.db_config()).await?;
/// let engine = InvoiceEngine::from_database(&db, &config);
///
/// let transactions = db.transactions().list_for_period(None, from, to).await?;
/// let run = engine.run_with_timeout(&transactions).await?;
/// ```
#[derive(Clone)]
pub struct InvoiceEngine {
    rules: Arc<dyn RuleSource>,
    shipments: Arc<dyn ShipmentSource>,
    history: Arc<dyn InvoiceHistory>,
    policy: PricingPolicy,
    chunk_size: usize,
    timeout: Duration,
}

impl InvoiceEngine {
    /// Creates an engine over arbitrary collaborators.
    pub fn new(
        rules: Arc<dyn RuleSource>,
        shipments: Arc<dyn ShipmentSource>,
        history: Arc<dyn InvoiceHistory>,
        config: &EngineConfig,
    ) -> Self {
        InvoiceEngine {
            rules,
            shipments,
            history,
            policy: config.pricing_policy(),
            chunk_size: config.lookups.chunk_size.max(1),
            timeout: config.timeout(),
        }
    }

    /// Creates an engine backed by the SQLite repositories.
    pub fn from_database(db: &Database, config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(db.rules()),
            Arc::new(db.shipments()),
            Arc::new(db.history()),
            config,
        )
    }

    /// The pricing policy every run uses.
    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Runs the pipeline, failing with [`EngineError::Timeout`] when it does
    /// not finish within the configured timeout.
    pub async fn run_with_timeout(&self, transactions: &[Transaction]) -> EngineResult<InvoiceRun> {
        tokio::time::timeout(self.timeout, self.run(transactions))
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Invoice run timed out");
                EngineError::Timeout(self.timeout.as_secs())
            })?
    }

    /// Runs the pipeline over `transactions`.
    pub async fn run(&self, transactions: &[Transaction]) -> EngineResult<InvoiceRun> {
        let span = info_span!("invoice_run", run_id = %Uuid::new_v4());
        self.run_inner(transactions).instrument(span).await
    }

    async fn run_inner(&self, transactions: &[Transaction]) -> EngineResult<InvoiceRun> {
        info!(transactions = transactions.len(), "Starting invoice run");

        let lines = classify_batch(transactions);
        debug!(
            line_items = lines.len(),
            skipped = transactions.len() - lines.len(),
            "Classified transactions"
        );

        let (attributes, history, rules) = futures_util::try_join!(
            self.load_attributes(&lines),
            self.load_history(&lines),
            self.load_rules(&lines),
        )?;

        let priced = price_batch(lines, &rules, &attributes, history, &self.policy);
        let reconciliation = reconcile(&priced, &self.policy);

        for adjustment in reconciliation.adjustments.iter().filter(|a| a.exceeds_alert_threshold) {
            warn!(
                category = %adjustment.category,
                markup_percentage = %adjustment.markup_percentage,
                expected = %adjustment.expected,
                actual = %adjustment.actual,
                diff = %adjustment.diff,
                line_id = %adjustment.line_id,
                "Reconciliation diff exceeds alert threshold"
            );
        }

        let summary = summarize(&reconciliation.line_items, self.policy.rounding);
        let unclassified: Vec<String> = reconciliation
            .line_items
            .iter()
            .filter(|l| l.details == FeeDetails::Unclassified)
            .map(|l| l.id.clone())
            .collect();

        info!(
            line_items = summary.line_count,
            subtotal = %summary.subtotal,
            markup = %summary.markup,
            total = %summary.total,
            adjustments = reconciliation.adjustments.len(),
            unclassified = unclassified.len(),
            "Invoice run complete"
        );

        Ok(InvoiceRun {
            line_items: reconciliation.line_items,
            summary,
            adjustments: reconciliation.adjustments,
            unclassified,
        })
    }

    // =========================================================================
    // Collaborator Lookups
    // =========================================================================

    async fn load_attributes(&self, lines: &[LineItem]) -> EngineResult<BTreeMap<String, ShipmentAttributes>> {
        let ids: Vec<String> = shipment_ids(lines).into_iter().collect();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let chunks = try_join_all(
            ids.chunks(self.chunk_size)
                .map(|chunk| self.shipments.shipment_attributes(chunk)),
        )
        .await?;

        let attributes: BTreeMap<String, ShipmentAttributes> = chunks
            .into_iter()
            .flatten()
            .map(|a| (a.shipment_id.clone(), a))
            .collect();

        debug!(
            requested = ids.len(),
            found = attributes.len(),
            chunks = ids.len().div_ceil(self.chunk_size),
            "Loaded shipment attributes"
        );
        Ok(attributes)
    }

    async fn load_history(&self, lines: &[LineItem]) -> EngineResult<Vec<ShipmentMarkup>> {
        let ids: Vec<String> = credited_shipment_ids(lines).into_iter().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = try_join_all(
            ids.chunks(self.chunk_size)
                .map(|chunk| self.history.invoiced_shipments(chunk)),
        )
        .await?;

        let history: Vec<ShipmentMarkup> = chunks.into_iter().flatten().collect();
        debug!(credited_shipments = ids.len(), found = history.len(), "Loaded invoice history");
        Ok(history)
    }

    async fn load_rules(&self, lines: &[LineItem]) -> EngineResult<BTreeMap<String, Vec<MarkupRule>>> {
        let fetches = earliest_dates(lines).into_iter().map(|(client_id, as_of)| async move {
            let mut rules = self.rules.fetch_active_rules(&client_id, as_of).await?;
            sort_for_matching(&mut rules);
            debug!(client_id = %client_id, as_of = %as_of, rules = rules.len(), "Fetched client rules");
            Ok::<_, EngineError>((client_id, rules))
        });

        Ok(try_join_all(fetches).await?.into_iter().collect())
    }
}

impl std::fmt::Debug for InvoiceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceEngine")
            .field("policy", &self.policy)
            .field("chunk_size", &self.chunk_size)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemorySources;
    use billing_core::{
        BillingCategory, MarkupSource, MarkupType, Money, ReferenceType,
        RoundingMode, RuleConditions, ShippingCostBreakdown,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn tx(id: &str, reference_type: ReferenceType, reference_id: &str, fee_type: &str, cost: Decimal) -> Transaction {
        Transaction {
            id: id.to_string(),
            client_id: "client-1".to_string(),
            reference_type,
            reference_id: reference_id.to_string(),
            fee_type: fee_type.to_string(),
            cost: Money::new(cost),
            shipping_costs: None,
            charge_date: date(15),
            details: Default::default(),
        }
    }

    fn shipping(id: &str, shipment: &str, cost: Decimal) -> Transaction {
        tx(id, ReferenceType::Shipment, shipment, "Shipping", cost)
    }

    fn credit(id: &str, shipment: &str, cost: Decimal) -> Transaction {
        tx(id, ReferenceType::Shipment, shipment, "Credit", cost)
    }

    fn rule(id: &str, category: BillingCategory, value: Decimal) -> MarkupRule {
        MarkupRule {
            id: id.to_string(),
            name: format!("{id} rule"),
            client_id: None,
            billing_category: Some(category),
            fee_type: None,
            order_category: None,
            ship_option_id: None,
            conditions: None,
            markup_type: MarkupType::Percentage,
            markup_value: value,
            priority: 0,
            effective_from: date(1),
            effective_to: None,
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn engine(sources: Arc<MemorySources>, config: &EngineConfig) -> InvoiceEngine {
        InvoiceEngine::new(sources.clone(), sources.clone(), sources, config)
    }

    fn line<'a>(run: &'a InvoiceRun, id: &str) -> &'a LineItem {
        run.line_items.iter().find(|l| l.id == id).unwrap()
    }

    // -------------------------------------------------------------------------
    // End to end
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_full_run() {
        let mut ground = rule("ground", BillingCategory::Shipping, dec!(18));
        ground.ship_option_id = Some("146".to_string());
        let mut heavy = rule("heavy", BillingCategory::Shipping, dec!(25));
        heavy.ship_option_id = Some("146".to_string());
        heavy.conditions = Some(RuleConditions {
            weight_min_oz: Some(dec!(80)),
            weight_max_oz: Some(dec!(160)),
            ..Default::default()
        });
        let picks = rule("picks", BillingCategory::PickFees, dec!(10));

        let sources = Arc::new(
            MemorySources::new()
                .with_rules([ground, heavy, picks])
                .with_shipments([
                    ShipmentAttributes {
                        shipment_id: "S-1".to_string(),
                        ship_option_id: Some("146".to_string()),
                        weight_oz: Some(dec!(112)),
                        ..Default::default()
                    },
                    ShipmentAttributes {
                        shipment_id: "S-2".to_string(),
                        ship_option_id: Some("146".to_string()),
                        weight_oz: Some(dec!(500)),
                        ..Default::default()
                    },
                ]),
        );

        let mut with_breakdown = shipping("t-2", "S-2", dec!(12.00));
        with_breakdown.shipping_costs = Some(ShippingCostBreakdown {
            base_cost: Money::new(dec!(10.00)),
            surcharge: Money::new(dec!(1.50)),
            insurance_cost: Money::new(dec!(0.50)),
        });

        let transactions = vec![
            shipping("t-1", "S-1", dec!(40.00)),
            with_breakdown,
            tx("t-3", ReferenceType::Shipment, "S-1", "Per Pick Fee", dec!(0.25)),
            tx("t-4", ReferenceType::FulfillmentCenter, "FC1-INV9-Pallet", "Storage", dec!(30.00)),
            tx("t-5", ReferenceType::Shipment, "S-1", "Shipping", Decimal::ZERO),
            tx("t-6", ReferenceType::Unknown("Widget".to_string()), "W-1", "Mystery Fee", dec!(3.00)),
        ];

        let run = engine(sources.clone(), &EngineConfig::default())
            .run(&transactions)
            .await
            .unwrap();

        // Zero-cost row dropped, everything else kept in order.
        let ids: Vec<&str> = run.line_items.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["t-1", "t-2", "t-3", "t-4", "t-6"]);

        // 112 oz picks the weight-bounded rule.
        let t1 = line(&run, "t-1");
        assert_eq!(t1.rule_id.as_deref(), Some("heavy"));
        assert_eq!(t1.billed_amount, Money::new(dec!(50.00)));

        // 500 oz falls back to the ship-option rule; surcharge passes through.
        let t2 = line(&run, "t-2");
        assert_eq!(t2.rule_id.as_deref(), Some("ground"));
        assert_eq!(t2.billed_amount, Money::new(dec!(13.89)));
        assert_eq!(t2.markup_applied, Money::new(dec!(1.89)));

        assert_eq!(line(&run, "t-3").billed_amount, Money::new(dec!(0.28)));

        // No storage rule: billed at cost.
        let t4 = line(&run, "t-4");
        assert_eq!(t4.billed_amount, Money::new(dec!(30.00)));
        assert_eq!(t4.markup_source, MarkupSource::None);

        let t6 = line(&run, "t-6");
        assert_eq!(t6.category, BillingCategory::AdditionalServices);
        assert_eq!(run.unclassified, vec!["t-6".to_string()]);

        assert_eq!(run.summary.line_count, 5);
        assert_eq!(run.summary.total, Money::new(dec!(97.17)));

        // One rule fetch for the one client, one shipment chunk, no credits.
        assert_eq!(sources.rule_calls(), 1);
        assert_eq!(sources.shipment_calls(), 1);
        assert_eq!(sources.history_calls(), 0);
    }

    #[tokio::test]
    async fn test_credit_inherits_in_batch_shipment() {
        let sources = Arc::new(MemorySources::new().with_rules([
            rule("ship-20", BillingCategory::Shipping, dec!(20)),
            rule("credit-5", BillingCategory::Credits, dec!(5)),
        ]));

        let run = engine(sources, &EngineConfig::default())
            .run(&[shipping("t-1", "S-1", dec!(50.00)), credit("t-2", "S-1", dec!(-50.00))])
            .await
            .unwrap();

        let credit = line(&run, "t-2");
        assert_eq!(credit.markup_source, MarkupSource::InheritedFromShipment);
        assert_eq!(credit.rule_id.as_deref(), Some("ship-20"));
        assert_eq!(credit.markup_applied, Money::new(dec!(-10.00)));
        assert_eq!(credit.billed_amount, Money::new(dec!(-60.00)));
    }

    #[tokio::test]
    async fn test_credit_inherits_from_history() {
        let sources = Arc::new(
            MemorySources::new()
                .with_rules([rule("credit-5", BillingCategory::Credits, dec!(5))])
                .with_history([ShipmentMarkup {
                    shipment_id: "S-9".to_string(),
                    base_amount: Money::new(dec!(40.00)),
                    markup_percentage: dec!(0.15),
                    rule_id: Some("old-ship-15".to_string()),
                }]),
        );

        let run = engine(sources.clone(), &EngineConfig::default())
            .run(&[credit("t-1", "S-9", dec!(-40.00)), credit("t-2", "S-10", dec!(-20.00))])
            .await
            .unwrap();

        let inherited = line(&run, "t-1");
        assert_eq!(inherited.rule_id.as_deref(), Some("old-ship-15"));
        assert_eq!(inherited.billed_amount, Money::new(dec!(-46.00)));

        // Unknown shipment: general rule matching.
        let matched = line(&run, "t-2");
        assert_eq!(matched.rule_id.as_deref(), Some("credit-5"));
        assert_eq!(matched.billed_amount, Money::new(dec!(-21.00)));

        assert_eq!(sources.history_calls(), 1);
    }

    #[tokio::test]
    async fn test_rounding_boundary_reconciled() {
        let sources = Arc::new(
            MemorySources::new().with_rules([rule("ship-18", BillingCategory::Shipping, dec!(18))]),
        );

        let run = engine(sources, &EngineConfig::default())
            .run(&[
                shipping("t-1", "S-1", dec!(10.005)),
                shipping("t-2", "S-2", dec!(10.005)),
                shipping("t-3", "S-3", dec!(10.00)),
            ])
            .await
            .unwrap();

        let total: Money = run.line_items.iter().map(|l| l.billed_amount).sum();
        assert_eq!(total, Money::new(dec!(35.41)));
        assert_eq!(run.adjustments.len(), 1);
        assert_eq!(run.alerts().count(), 0);
        assert_eq!(
            run.summary.category(BillingCategory::Shipping).unwrap().total,
            Money::new(dec!(35.41))
        );
    }

    #[tokio::test]
    async fn test_fba_shipping_is_fulfillment() {
        let sources = Arc::new(MemorySources::new());
        let mut fba = shipping("t-1", "S-1", dec!(8.00));
        fba.details
            .insert("order_category".to_string(), serde_json::json!("FBA"));

        let run = engine(sources, &EngineConfig::default()).run(&[fba]).await.unwrap();
        assert_eq!(run.line_items[0].category, BillingCategory::Fulfillment);
        assert_eq!(
            run.summary.category(BillingCategory::Fulfillment).unwrap().count,
            1
        );
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_runs_are_deterministic() {
        let sources = Arc::new(MemorySources::new().with_rules([
            rule("ship-18", BillingCategory::Shipping, dec!(18)),
            rule("svc-12", BillingCategory::AdditionalServices, dec!(12.5)),
        ]));
        let transactions: Vec<Transaction> = (0..40)
            .map(|i| {
                let cost = Decimal::new(1000 + i * 7, 3) * Decimal::from(i % 5 + 1);
                if i % 3 == 0 {
                    tx(&format!("t-{i}"), ReferenceType::Shipment, &format!("S-{i}"), "Kitting Fee", cost)
                } else {
                    shipping(&format!("t-{i}"), &format!("S-{i}"), cost)
                }
            })
            .collect();

        let engine = engine(sources, &EngineConfig::default());
        let first = engine.run(&transactions).await.unwrap();
        let second = engine.run(&transactions).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_lookups_are_chunked() {
        let sources = Arc::new(MemorySources::new());
        let mut config = EngineConfig::default();
        config.lookups.chunk_size = 2;

        let transactions: Vec<Transaction> = (0..5)
            .map(|i| credit(&format!("t-{i}"), &format!("S-{i}"), dec!(-5.00)))
            .collect();

        let run = engine(sources.clone(), &config).run(&transactions).await.unwrap();
        assert_eq!(run.line_items.len(), 5);
        assert_eq!(sources.shipment_calls(), 3);
        assert_eq!(sources.history_calls(), 3);
        assert_eq!(sources.rule_calls(), 1);
    }

    #[tokio::test]
    async fn test_rules_fetched_once_per_client() {
        let sources = Arc::new(MemorySources::new());
        let mut transactions = Vec::new();
        for (i, client) in ["a", "b", "a", "c", "b"].iter().enumerate() {
            let mut t = shipping(&format!("t-{i}"), &format!("S-{i}"), dec!(1.00));
            t.client_id = client.to_string();
            transactions.push(t);
        }

        engine(sources.clone(), &EngineConfig::default())
            .run(&transactions)
            .await
            .unwrap();
        assert_eq!(sources.rule_calls(), 3);
    }

    #[tokio::test]
    async fn test_half_even_rounding_from_config() {
        let sources = Arc::new(
            MemorySources::new().with_rules([rule("picks-10", BillingCategory::PickFees, dec!(10))]),
        );
        let transactions = [tx("t-1", ReferenceType::Shipment, "S-1", "Per Pick Fee", dec!(0.25))];

        // 0.25 * 10% = 0.025: banker's rounding keeps 0.02, the default gives 0.03.
        let mut config = EngineConfig::default();
        config.pricing.rounding = RoundingMode::HalfEven;
        let run = engine(sources.clone(), &config).run(&transactions).await.unwrap();
        assert_eq!(run.line_items[0].markup_applied, Money::new(dec!(0.02)));

        let run = engine(sources, &EngineConfig::default()).run(&transactions).await.unwrap();
        assert_eq!(run.line_items[0].markup_applied, Money::new(dec!(0.03)));
    }

    #[tokio::test]
    async fn test_empty_run() {
        let sources = Arc::new(MemorySources::new());
        let run = engine(sources.clone(), &EngineConfig::default()).run(&[]).await.unwrap();

        assert!(run.line_items.is_empty());
        assert_eq!(run.summary.categories.len(), 9);
        assert!(run.summary.total.is_zero());
        assert_eq!(sources.rule_calls() + sources.shipment_calls() + sources.history_calls(), 0);
    }

    #[tokio::test]
    async fn test_run_against_sqlite() {
        let db = Database::new(billing_db::DbConfig::in_memory()).await.unwrap();
        let mut fixed = rule("ship-fixed", BillingCategory::Shipping, dec!(1.50));
        fixed.markup_type = MarkupType::FixedAmount;
        fixed.ship_option_id = Some("146".to_string());
        db.rules().insert(&rule("ship-20", BillingCategory::Shipping, dec!(20))).await.unwrap();
        db.rules().insert(&fixed).await.unwrap();
        db.shipments()
            .upsert(&ShipmentAttributes {
                shipment_id: "S-1".to_string(),
                ship_option_id: Some("146".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        db.history()
            .record(
                "INV-1",
                &ShipmentMarkup {
                    shipment_id: "S-0".to_string(),
                    base_amount: Money::new(dec!(50.00)),
                    markup_percentage: dec!(0.20),
                    rule_id: Some("ship-20".to_string()),
                },
            )
            .await
            .unwrap();

        let engine = InvoiceEngine::from_database(&db, &EngineConfig::default());
        let run = engine
            .run_with_timeout(&[
                shipping("t-1", "S-1", dec!(10.00)),
                shipping("t-2", "S-2", dec!(10.00)),
                credit("t-3", "S-0", dec!(-50.00)),
            ])
            .await
            .unwrap();

        // Ship option 146 makes the fixed rule more specific.
        assert_eq!(line(&run, "t-1").billed_amount, Money::new(dec!(11.50)));
        assert_eq!(line(&run, "t-1").markup_percentage, None);
        assert_eq!(line(&run, "t-2").billed_amount, Money::new(dec!(12.00)));
        assert_eq!(line(&run, "t-3").billed_amount, Money::new(dec!(-60.00)));
    }

    // -------------------------------------------------------------------------
    // Timeout
    // -------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let sources = Arc::new(MemorySources::new().with_delay(Duration::from_secs(10)));
        let mut config = EngineConfig::default();
        config.lookups.timeout_secs = 1;

        let err = engine(sources, &config)
            .run_with_timeout(&[shipping("t-1", "S-1", dec!(5.00))])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_within_timeout() {
        let sources = Arc::new(MemorySources::new().with_delay(Duration::from_millis(100)));
        let run = engine(sources, &EngineConfig::default())
            .run_with_timeout(&[shipping("t-1", "S-1", dec!(5.00))])
            .await
            .unwrap();
        assert_eq!(run.line_items.len(), 1);
    }
}
