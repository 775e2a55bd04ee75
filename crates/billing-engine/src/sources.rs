//! # Collaborator Sources
//!
//! The three read-only lookups an invoice run depends on, as async traits.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Trait                 Production (billing-db)        Tests             │
//! │  ─────────────────     ──────────────────────────     ───────────────   │
//! │  RuleSource            MarkupRuleRepository           MemorySources     │
//! │  ShipmentSource        ShipmentRepository             MemorySources     │
//! │  InvoiceHistory        InvoiceHistoryRepository       MemorySources     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use billing_core::rules::sort_for_matching;
use billing_core::{MarkupRule, ShipmentAttributes, ShipmentMarkup};
use billing_db::{InvoiceHistoryRepository, MarkupRuleRepository, ShipmentRepository};

use crate::error::EngineResult;

// =============================================================================
// Traits
// =============================================================================

/// Markup rules per client.
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Active rules that are global or scoped to `client_id`, effective on
    /// `as_of`, ordered by priority DESC then creation ASC.
    async fn fetch_active_rules(&self, client_id: &str, as_of: NaiveDate) -> EngineResult<Vec<MarkupRule>>;
}

/// Order-system shipment attributes.
#[async_trait]
pub trait ShipmentSource: Send + Sync {
    /// Attributes for the known ids among `ids`.
    async fn shipment_attributes(&self, ids: &[String]) -> EngineResult<Vec<ShipmentAttributes>>;
}

/// Previously invoiced shipments.
#[async_trait]
pub trait InvoiceHistory: Send + Sync {
    /// Invoiced markups for `ids`, most recent first within a shipment.
    async fn invoiced_shipments(&self, ids: &[String]) -> EngineResult<Vec<ShipmentMarkup>>;
}

// =============================================================================
// SQLite Implementations
// =============================================================================

#[async_trait]
impl RuleSource for MarkupRuleRepository {
    async fn fetch_active_rules(&self, client_id: &str, as_of: NaiveDate) -> EngineResult<Vec<MarkupRule>> {
        Ok(self.fetch_active(client_id, as_of).await?)
    }
}

#[async_trait]
impl ShipmentSource for ShipmentRepository {
    async fn shipment_attributes(&self, ids: &[String]) -> EngineResult<Vec<ShipmentAttributes>> {
        Ok(self.attributes_for(ids).await?)
    }
}

#[async_trait]
impl InvoiceHistory for InvoiceHistoryRepository {
    async fn invoiced_shipments(&self, ids: &[String]) -> EngineResult<Vec<ShipmentMarkup>> {
        Ok(self.invoiced_for(ids).await?)
    }
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

/// In-memory collaborators with call counters.
///
/// Backs engine tests and dry runs that don't touch a database.
#[derive(Debug, Default)]
pub struct MemorySources {
    rules: Vec<MarkupRule>,
    shipments: BTreeMap<String, ShipmentAttributes>,
    history: Vec<ShipmentMarkup>,
    delay: Option<Duration>,
    rule_calls: AtomicUsize,
    shipment_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = MarkupRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn with_shipments(mut self, shipments: impl IntoIterator<Item = ShipmentAttributes>) -> Self {
        for attributes in shipments {
            self.shipments.insert(attributes.shipment_id.clone(), attributes);
        }
        self
    }

    /// History entries, most recent first per shipment.
    pub fn with_history(mut self, history: impl IntoIterator<Item = ShipmentMarkup>) -> Self {
        self.history.extend(history);
        self
    }

    /// Makes every lookup sleep first (timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `fetch_active_rules` calls so far.
    pub fn rule_calls(&self) -> usize {
        self.rule_calls.load(Ordering::SeqCst)
    }

    /// Number of `shipment_attributes` calls so far.
    pub fn shipment_calls(&self) -> usize {
        self.shipment_calls.load(Ordering::SeqCst)
    }

    /// Number of `invoiced_shipments` calls so far.
    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RuleSource for MemorySources {
    async fn fetch_active_rules(&self, client_id: &str, as_of: NaiveDate) -> EngineResult<Vec<MarkupRule>> {
        self.rule_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let mut rules: Vec<MarkupRule> = self
            .rules
            .iter()
            .filter(|r| r.is_effective_on(as_of))
            .filter(|r| r.client_id.as_deref().map_or(true, |c| c == client_id))
            .cloned()
            .collect();
        sort_for_matching(&mut rules);
        Ok(rules)
    }
}

#[async_trait]
impl ShipmentSource for MemorySources {
    async fn shipment_attributes(&self, ids: &[String]) -> EngineResult<Vec<ShipmentAttributes>> {
        self.shipment_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        Ok(ids.iter().filter_map(|id| self.shipments.get(id).cloned()).collect())
    }
}

#[async_trait]
impl InvoiceHistory for MemorySources {
    async fn invoiced_shipments(&self, ids: &[String]) -> EngineResult<Vec<ShipmentMarkup>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        Ok(self
            .history
            .iter()
            .filter(|m| ids.contains(&m.shipment_id))
            .cloned()
            .collect())
    }
}
