//! # Markup Rule Repository
//!
//! Stored markup rules, fetched once per client per invoice run.
//!
//! ## Fetch Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  fetch_active("client-1", 2024-03-01)                                   │
//! │                                                                         │
//! │  WHERE is_active = 1                                                    │
//! │    AND (client_id IS NULL OR client_id = 'client-1')                    │
//! │    AND effective_from <= '2024-03-01'                                   │
//! │    AND (effective_to IS NULL OR effective_to >= '2024-03-01')           │
//! │  ORDER BY priority DESC, created_at ASC, id ASC                         │
//! │                                                                         │
//! │  The matcher relies on this order: among equally specific rules the     │
//! │  first one returned wins.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::parse_decimal;
use billing_core::validation::validate_rule;
use billing_core::{BillingCategory, MarkupRule, MarkupType, OrderCategory, RuleConditions};

const ENTITY: &str = "markup_rule";

/// Raw `markup_rules` row.
#[derive(Debug, sqlx::FromRow)]
struct MarkupRuleRecord {
    id: String,
    name: String,
    client_id: Option<String>,
    billing_category: Option<String>,
    fee_type: Option<String>,
    order_category: Option<String>,
    ship_option_id: Option<String>,
    conditions: Option<String>,
    markup_type: String,
    markup_value: String,
    priority: i32,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MarkupRuleRecord> for MarkupRule {
    type Error = DbError;

    fn try_from(row: MarkupRuleRecord) -> DbResult<Self> {
        let invalid = |reason: String| DbError::invalid_record(ENTITY, row.id.as_str(), reason);

        let billing_category = row
            .billing_category
            .as_deref()
            .map(str::parse::<BillingCategory>)
            .transpose()
            .map_err(|e| invalid(e.to_string()))?;

        let order_category = row
            .order_category
            .as_deref()
            .map(str::parse::<OrderCategory>)
            .transpose()
            .map_err(|e| invalid(e.to_string()))?;

        let markup_type = row
            .markup_type
            .parse::<MarkupType>()
            .map_err(|e| invalid(e.to_string()))?;

        let conditions = match row.conditions.as_deref().map(str::trim) {
            None | Some("") | Some("null") => None,
            Some(json) => Some(
                serde_json::from_str::<RuleConditions>(json)
                    .map_err(|e| invalid(format!("conditions: {e}")))?,
            ),
        };

        let markup_value = parse_decimal(ENTITY, &row.id, "markup_value", &row.markup_value)?;

        Ok(MarkupRule {
            id: row.id,
            name: row.name,
            client_id: row.client_id,
            billing_category,
            fee_type: row.fee_type,
            order_category,
            ship_option_id: row.ship_option_id,
            conditions,
            markup_type,
            markup_value,
            priority: row.priority,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Repository for markup rule database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = MarkupRuleRepository::new(pool);
/// let rules = repo.fetch_active("client-1", as_of).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MarkupRuleRepository {
    pool: SqlitePool,
}

impl MarkupRuleRepository {
    /// Creates a new MarkupRuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MarkupRuleRepository { pool }
    }

    /// Active rules for `client_id` (plus global rules) effective on `as_of`,
    /// ordered by priority DESC, then creation ASC.
    ///
    /// A stored rule that cannot be decoded aborts the fetch: pricing with a
    /// silently missing rule would under-bill.
    pub async fn fetch_active(&self, client_id: &str, as_of: NaiveDate) -> DbResult<Vec<MarkupRule>> {
        let rows = sqlx::query_as::<_, MarkupRuleRecord>(
            r#"
            SELECT
                id, name, client_id, billing_category, fee_type, order_category,
                ship_option_id, conditions, markup_type, markup_value, priority,
                effective_from, effective_to, is_active, created_at
            FROM markup_rules
            WHERE is_active = 1
              AND (client_id IS NULL OR client_id = ?1)
              AND effective_from <= ?2
              AND (effective_to IS NULL OR effective_to >= ?2)
            ORDER BY priority DESC, created_at ASC, id ASC
            "#,
        )
        .bind(client_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        let rules = rows
            .into_iter()
            .map(MarkupRule::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        debug!(client_id = %client_id, as_of = %as_of, count = rules.len(), "Fetched active markup rules");
        Ok(rules)
    }

    /// Inserts a new rule after validating it.
    pub async fn insert(&self, rule: &MarkupRule) -> DbResult<()> {
        validate_rule(rule).map_err(|e| DbError::invalid_record(ENTITY, rule.id.as_str(), e))?;

        let conditions = rule
            .conditions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        debug!(id = %rule.id, name = %rule.name, "Inserting markup rule");

        sqlx::query(
            r#"
            INSERT INTO markup_rules (
                id, name, client_id, billing_category, fee_type, order_category,
                ship_option_id, conditions, markup_type, markup_value, priority,
                effective_from, effective_to, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(&rule.client_id)
        .bind(rule.billing_category.map(|c| c.as_str()))
        .bind(&rule.fee_type)
        .bind(rule.order_category.map(|c| c.as_str()))
        .bind(&rule.ship_option_id)
        .bind(conditions)
        .bind(rule.markup_type.as_str())
        .bind(rule.markup_value.to_string())
        .bind(rule.priority)
        .bind(rule.effective_from)
        .bind(rule.effective_to)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: rule.id.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    /// Marks a rule inactive. Returns `NotFound` for an unknown id.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE markup_rules SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("MarkupRule", id));
        }
        debug!(id = %id, "Deactivated markup rule");
        Ok(())
    }
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(id: &str, client: Option<&str>, priority: i32, created_day: u32) -> MarkupRule {
        MarkupRule {
            id: id.to_string(),
            name: format!("Rule {id}"),
            client_id: client.map(str::to_string),
            billing_category: Some(BillingCategory::Shipping),
            fee_type: Some("Shipping".to_string()),
            order_category: None,
            ship_option_id: None,
            conditions: None,
            markup_type: MarkupType::Percentage,
            markup_value: dec!(18),
            priority,
            effective_from: date(2024, 1, 1),
            effective_to: None,
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, created_day, 0, 0, 0).unwrap(),
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_with_conditions() {
        let db = db().await;
        let mut stored = rule("r-1", Some("client-1"), 0, 1);
        stored.ship_option_id = Some("146".to_string());
        stored.order_category = Some(OrderCategory::Fba);
        stored.conditions = Some(RuleConditions {
            weight_min_oz: Some(dec!(80)),
            weight_max_oz: Some(dec!(160)),
            states: Some(vec!["CA".to_string()]),
            ..Default::default()
        });
        db.rules().insert(&stored).await.unwrap();

        let fetched = db.rules().fetch_active("client-1", date(2024, 3, 15)).await.unwrap();
        assert_eq!(fetched, vec![stored]);
    }

    #[tokio::test]
    async fn test_fetch_scope_and_order() {
        let db = db().await;
        let repo = db.rules();
        repo.insert(&rule("late", None, 0, 20)).await.unwrap();
        repo.insert(&rule("early", None, 0, 5)).await.unwrap();
        repo.insert(&rule("urgent", Some("client-1"), 10, 25)).await.unwrap();
        repo.insert(&rule("other", Some("client-2"), 99, 1)).await.unwrap();

        let mut expired = rule("expired", None, 50, 1);
        expired.effective_to = Some(date(2024, 2, 1));
        repo.insert(&expired).await.unwrap();

        let mut future = rule("future", None, 50, 1);
        future.effective_from = date(2024, 6, 1);
        repo.insert(&future).await.unwrap();

        repo.insert(&rule("off", None, 50, 1)).await.unwrap();
        repo.deactivate("off").await.unwrap();

        let ids: Vec<String> = repo
            .fetch_active("client-1", date(2024, 3, 15))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["urgent", "early", "late"]);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_rule() {
        let db = db().await;
        let mut bad = rule("bad", None, 0, 1);
        bad.markup_value = dec!(5000);

        let err = db.rules().insert(&bad).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_id() {
        let db = db().await;
        db.rules().insert(&rule("dup", None, 0, 1)).await.unwrap();
        let err = db.rules().insert(&rule("dup", None, 0, 2)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "dup"));
    }

    #[tokio::test]
    async fn test_corrupt_markup_value_is_an_error() {
        let db = db().await;
        db.rules().insert(&rule("r-1", None, 0, 1)).await.unwrap();
        sqlx::query("UPDATE markup_rules SET markup_value = 'eighteen' WHERE id = 'r-1'")
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.rules().fetch_active("client-1", date(2024, 3, 15)).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidRecord { ref id, .. } if id == "r-1"));
    }

    #[tokio::test]
    async fn test_deactivate_unknown() {
        let db = db().await;
        let err = db.rules().deactivate("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
