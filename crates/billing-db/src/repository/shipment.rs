//! # Shipment Repository
//!
//! Order-system attributes used to enrich shipment-linked line items
//! (ship option, weight, destination, order category).
//!
//! Enrichment data is best-effort: an unreadable weight or order category
//! is logged and treated as unknown instead of failing the invoice run.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::repository::parse_decimal_lenient;
use billing_core::{OrderCategory, ShipmentAttributes};

/// Raw `shipments` row.
#[derive(Debug, sqlx::FromRow)]
struct ShipmentRecord {
    shipment_id: String,
    ship_option_id: Option<String>,
    weight_oz: Option<String>,
    state: Option<String>,
    country: Option<String>,
    order_category: Option<String>,
}

impl From<ShipmentRecord> for ShipmentAttributes {
    fn from(row: ShipmentRecord) -> Self {
        let weight_oz = parse_decimal_lenient(row.weight_oz.as_deref());
        if weight_oz.is_none() && row.weight_oz.as_deref().is_some_and(|w| !w.trim().is_empty()) {
            warn!(shipment_id = %row.shipment_id, weight = ?row.weight_oz, "Unreadable shipment weight, treating as unknown");
        }

        let order_category = row
            .order_category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .and_then(|c| match c.parse::<OrderCategory>() {
                Ok(category) => Some(category),
                Err(_) => {
                    warn!(shipment_id = %row.shipment_id, order_category = %c, "Unknown order category, treating as unknown");
                    None
                }
            });

        ShipmentAttributes {
            shipment_id: row.shipment_id,
            ship_option_id: row.ship_option_id,
            weight_oz,
            state: row.state,
            country: row.country,
            order_category,
        }
    }
}

/// Repository for shipment attribute lookups.
#[derive(Debug, Clone)]
pub struct ShipmentRepository {
    pool: SqlitePool,
}

impl ShipmentRepository {
    /// Creates a new ShipmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShipmentRepository { pool }
    }

    /// Attributes for every known id in `shipment_ids`, in id order.
    ///
    /// Unknown ids are simply absent from the result. Callers chunk large
    /// id lists; this issues a single `IN (...)` query.
    pub async fn attributes_for(&self, shipment_ids: &[String]) -> DbResult<Vec<ShipmentAttributes>> {
        if shipment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT shipment_id, ship_option_id, weight_oz, state, country, order_category \
             FROM shipments WHERE shipment_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in shipment_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(") ORDER BY shipment_id");

        let rows = query
            .build_query_as::<ShipmentRecord>()
            .fetch_all(&self.pool)
            .await?;

        debug!(requested = shipment_ids.len(), found = rows.len(), "Loaded shipment attributes");
        Ok(rows.into_iter().map(ShipmentAttributes::from).collect())
    }

    /// Inserts or replaces the attributes of one shipment.
    pub async fn upsert(&self, attributes: &ShipmentAttributes) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shipments (
                shipment_id, ship_option_id, weight_oz, state, country, order_category, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(shipment_id) DO UPDATE SET
                ship_option_id = excluded.ship_option_id,
                weight_oz = excluded.weight_oz,
                state = excluded.state,
                country = excluded.country,
                order_category = excluded.order_category,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&attributes.shipment_id)
        .bind(&attributes.ship_option_id)
        .bind(attributes.weight_oz.map(|w| w.to_string()))
        .bind(&attributes.state)
        .bind(&attributes.country)
        .bind(attributes.order_category.map(|c| c.as_str()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(shipment_id = %attributes.shipment_id, "Upserted shipment attributes");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
