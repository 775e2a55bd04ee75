//! # Invoice History Repository
//!
//! How previously invoiced shipments were marked up, so that a credit
//! arriving in a later run can be discounted at the original rate.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Run N   Shipment S-1 billed 50.00 @ 20%                                │
//! │            │                                                            │
//! │            └── record_line_items("INV-N", &lines)                       │
//! │                  → invoiced_shipments (S-1, 50.00, 0.20, rule)          │
//! │                                                                         │
//! │  Run N+1 Credit -50.00 referencing S-1 (S-1 not in this batch)          │
//! │            │                                                            │
//! │            └── invoiced_for(["S-1"])  → latest entry first              │
//! │                  → credit inherits 20%                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use billing_core::{LineItem, Money, ShipmentMarkup};

/// Raw `invoiced_shipments` row.
#[derive(Debug, sqlx::FromRow)]
struct InvoicedShipmentRecord {
    id: String,
    shipment_id: String,
    base_amount: String,
    markup_percentage: String,
    rule_id: Option<String>,
}

impl InvoicedShipmentRecord {
    /// `None` when the stored percentage is unreadable; such a row can't be
    /// inherited from and the credit falls back to rule matching.
    fn into_markup(self) -> Option<ShipmentMarkup> {
        let markup_percentage = match Decimal::from_str(self.markup_percentage.trim()) {
            Ok(m) => m,
            Err(e) => {
                warn!(
                    id = %self.id,
                    shipment_id = %self.shipment_id,
                    error = %e,
                    "Unreadable markup percentage in invoice history, skipping"
                );
                return None;
            }
        };

        Some(ShipmentMarkup {
            shipment_id: self.shipment_id,
            base_amount: Money::parse_lenient(&self.base_amount),
            markup_percentage,
            rule_id: self.rule_id,
        })
    }
}

/// Repository for previously invoiced shipments.
#[derive(Debug, Clone)]
pub struct InvoiceHistoryRepository {
    pool: SqlitePool,
}

impl InvoiceHistoryRepository {
    /// Creates a new InvoiceHistoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceHistoryRepository { pool }
    }

    /// Invoiced markups for `shipment_ids`, most recent invoice first within
    /// each shipment.
    pub async fn invoiced_for(&self, shipment_ids: &[String]) -> DbResult<Vec<ShipmentMarkup>> {
        if shipment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, shipment_id, base_amount, markup_percentage, rule_id \
             FROM invoiced_shipments WHERE shipment_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in shipment_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(") ORDER BY shipment_id ASC, invoiced_at DESC, id ASC");

        let rows = query
            .build_query_as::<InvoicedShipmentRecord>()
            .fetch_all(&self.pool)
            .await?;

        debug!(requested = shipment_ids.len(), found = rows.len(), "Loaded invoice history");
        Ok(rows.into_iter().filter_map(InvoicedShipmentRecord::into_markup).collect())
    }

    /// Records one invoiced shipment markup.
    pub async fn record(&self, invoice_id: &str, markup: &ShipmentMarkup) -> DbResult<()> {
        self.record_at(invoice_id, markup, Utc::now()).await
    }

    /// Records one invoiced shipment markup with an explicit timestamp.
    pub async fn record_at(
        &self,
        invoice_id: &str,
        markup: &ShipmentMarkup,
        invoiced_at: DateTime<Utc>,
    ) -> DbResult<()> {
        insert_markup(&self.pool, invoice_id, markup, invoiced_at).await
    }

    /// Records every inheritable shipment line of an accepted invoice in one
    /// transaction. Returns how many rows were written.
    pub async fn record_line_items(&self, invoice_id: &str, lines: &[LineItem]) -> DbResult<usize> {
        let markups: Vec<ShipmentMarkup> = lines.iter().filter_map(ShipmentMarkup::from_line).collect();
        let invoiced_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        for markup in &markups {
            insert_markup(&mut *tx, invoice_id, markup, invoiced_at).await?;
        }
        tx.commit().await?;

        info!(invoice_id = %invoice_id, count = markups.len(), "Recorded invoiced shipments");
        Ok(markups.len())
    }
}

async fn insert_markup<'e, E>(
    executor: E,
    invoice_id: &str,
    markup: &ShipmentMarkup,
    invoiced_at: DateTime<Utc>,
) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO invoiced_shipments (
            id, invoice_id, shipment_id, base_amount, markup_percentage, rule_id, invoiced_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(invoice_id)
    .bind(&markup.shipment_id)
    .bind(markup.base_amount.amount().to_string())
    .bind(markup.markup_percentage.to_string())
    .bind(&markup.rule_id)
    .bind(invoiced_at)
    .execute(executor)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn markup(shipment_id: &str, base: Decimal, pct: Decimal, rule: &str) -> ShipmentMarkup {
        ShipmentMarkup {
            shipment_id: shipment_id.to_string(),
            base_amount: Money::new(base),
            markup_percentage: pct,
            rule_id: Some(rule.to_string()),
        }
    }

    #[tokio::test]
    async fn test_latest_invoice_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.history();

        let older = markup("S-1", dec!(50.00), dec!(0.15), "old-rule");
        let newer = markup("S-1", dec!(50.00), dec!(0.20), "new-rule");
        repo.record_at("INV-1", &older, Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap())
            .await
            .unwrap();
        repo.record_at("INV-2", &newer, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap())
            .await
            .unwrap();
        repo.record("INV-2", &markup("S-2", dec!(10.005), dec!(0.18), "r"))
            .await
            .unwrap();

        let found = repo
            .invoiced_for(&["S-1".to_string(), "S-2".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0], newer);
        assert_eq!(found[1], older);
        assert_eq!(found[2].base_amount, Money::new(dec!(10.005)));
    }

    #[tokio::test]
    async fn test_unreadable_percentage_is_skipped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query(
            "INSERT INTO invoiced_shipments \
             (id, invoice_id, shipment_id, base_amount, markup_percentage, invoiced_at) \
             VALUES ('h-1', 'INV-1', 'S-1', '50.00', 'n/a', '2024-01-31T00:00:00Z')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        assert!(db.history().invoiced_for(&["S-1".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_line_items() {
        use billing_core::classify::classify;
        use billing_core::pricing::price_line;
        use billing_core::{PricingPolicy, ReferenceType, Transaction};
        use chrono::NaiveDate;

        let tx = |id: &str, reference_type: ReferenceType, fee_type: &str| Transaction {
            id: id.to_string(),
            client_id: "client-1".to_string(),
            reference_type,
            reference_id: format!("REF-{id}"),
            fee_type: fee_type.to_string(),
            cost: Money::new(dec!(50.00)),
            shipping_costs: None,
            charge_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            details: Default::default(),
        };
        let policy = PricingPolicy::default();
        let lines: Vec<LineItem> = [
            tx("1", ReferenceType::Shipment, "Shipping"),
            tx("2", ReferenceType::FulfillmentCenter, "Storage"),
        ]
        .iter()
        .filter_map(classify)
        .map(|line| price_line(line, None, &policy))
        .collect();
        assert_eq!(lines.len(), 2);

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let written = db.history().record_line_items("INV-7", &lines).await.unwrap();
        assert_eq!(written, 1);

        let found = db.history().invoiced_for(&["REF-1".to_string()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].base_amount, Money::new(dec!(50.00)));
        assert_eq!(found[0].markup_percentage, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_empty_id_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.history().invoiced_for(&[]).await.unwrap().is_empty());
    }
}
