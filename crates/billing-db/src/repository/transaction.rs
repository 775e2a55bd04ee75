//! # Transaction Repository
//!
//! The provider's fee feed. Rows arrive before their shipping cost
//! breakdown; the breakdown columns are filled in later by a separate feed.
//!
//! Feed rows are read leniently: a malformed amount becomes zero and
//! malformed details become an empty map, each with a warning. A fee that
//! cannot be read must still reach the invoice.

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use billing_core::{Money, ReferenceType, ShippingCostBreakdown, Transaction};

/// Raw `transactions` row.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRecord {
    id: String,
    client_id: String,
    reference_type: String,
    reference_id: String,
    fee_type: String,
    cost: String,
    base_cost: Option<String>,
    surcharge: Option<String>,
    insurance_cost: Option<String>,
    charge_date: NaiveDate,
    details: String,
}

impl From<TransactionRecord> for Transaction {
    fn from(row: TransactionRecord) -> Self {
        let shipping_costs = if row.base_cost.is_some() || row.surcharge.is_some() || row.insurance_cost.is_some() {
            let part = |raw: &Option<String>| raw.as_deref().map(Money::parse_lenient).unwrap_or_default();
            Some(ShippingCostBreakdown {
                base_cost: part(&row.base_cost),
                surcharge: part(&row.surcharge),
                insurance_cost: part(&row.insurance_cost),
            })
        } else {
            None
        };

        let details = match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&row.details) {
            Ok(map) => map,
            Err(e) => {
                warn!(id = %row.id, error = %e, "Malformed transaction details, using empty map");
                BTreeMap::new()
            }
        };

        Transaction {
            cost: Money::parse_lenient(&row.cost),
            id: row.id,
            client_id: row.client_id,
            reference_type: ReferenceType::from(row.reference_type),
            reference_id: row.reference_id,
            fee_type: row.fee_type,
            shipping_costs,
            charge_date: row.charge_date,
            details,
        }
    }
}

/// Repository for the transaction feed.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Transactions charged in `[from, to]`, optionally for one client,
    /// ordered by charge date then id.
    pub async fn list_for_period(
        &self,
        client_id: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<Transaction>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, client_id, reference_type, reference_id, fee_type, cost, \
             base_cost, surcharge, insurance_cost, charge_date, details \
             FROM transactions WHERE charge_date >= ",
        );
        query.push_bind(from);
        query.push(" AND charge_date <= ");
        query.push_bind(to);
        if let Some(client_id) = client_id {
            query.push(" AND client_id = ");
            query.push_bind(client_id);
        }
        query.push(" ORDER BY charge_date ASC, id ASC");

        let rows = query
            .build_query_as::<TransactionRecord>()
            .fetch_all(&self.pool)
            .await?;

        debug!(
            client_id = ?client_id,
            from = %from,
            to = %to,
            count = rows.len(),
            "Loaded transactions"
        );
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    /// Inserts one feed row.
    pub async fn insert(&self, transaction: &Transaction) -> DbResult<()> {
        let details = serde_json::to_string(&transaction.details)?;
        let breakdown = transaction.shipping_costs.as_ref();

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, client_id, reference_type, reference_id, fee_type, cost,
                base_cost, surcharge, insurance_cost, charge_date, details
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.client_id)
        .bind(transaction.reference_type.as_str())
        .bind(&transaction.reference_id)
        .bind(&transaction.fee_type)
        .bind(transaction.cost.amount().to_string())
        .bind(breakdown.map(|b| b.base_cost.amount().to_string()))
        .bind(breakdown.map(|b| b.surcharge.amount().to_string()))
        .bind(breakdown.map(|b| b.insurance_cost.amount().to_string()))
        .bind(transaction.charge_date)
        .bind(details)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: transaction.id.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    /// Stores the shipping cost breakdown once the breakdown feed delivers it.
    pub async fn set_shipping_costs(&self, id: &str, breakdown: &ShippingCostBreakdown) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE transactions SET base_cost = ?1, surcharge = ?2, insurance_cost = ?3 WHERE id = ?4",
        )
        .bind(breakdown.base_cost.amount().to_string())
        .bind(breakdown.surcharge.amount().to_string())
        .bind(breakdown.insurance_cost.amount().to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Transaction", id));
        }
        debug!(id = %id, "Stored shipping cost breakdown");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
