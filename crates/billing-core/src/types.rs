//! # Domain Types
//!
//! Core domain types used throughout the billing pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │  Transaction    │   │    LineItem     │   │ BillingCategory │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  reference_type │──►│  category       │   │  Fulfillment    │        │
//! │  │  fee_type       │   │  base_amount    │   │  Shipping       │        │
//! │  │  cost (signed)  │   │  markup_applied │   │  Pick Fees ...  │        │
//! │  │  details (map)  │   │  billed_amount  │   │  (nine, fixed)  │        │
//! │  └─────────────────┘   │  details (enum) │   └─────────────────┘        │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │ ReferenceType   │   │ OrderCategory   │   │   FeeDetails    │        │
//! │  │  Shipment, FC   │   │  Standard       │   │  Shipping       │        │
//! │  │  Return, WRO    │   │  FBA            │   │  Storage        │        │
//! │  │  TicketNumber   │   │  VAS            │   │  Credit ...     │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! Transactions are supplied fresh for each run. Line items are produced by
//! the classifier, priced, reconciled (as a new vector) and summarised. A
//! line item's category never changes after classification.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::{self, Money};

// =============================================================================
// Reference Type
// =============================================================================

/// What a transaction's `reference_id` points at.
///
/// Unrecognised values are kept verbatim in `Unknown` so they can still be
/// logged and billed through the catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReferenceType {
    /// Outbound shipment (`reference_id` = shipment id).
    Shipment,
    /// Fulfillment center storage (`reference_id` = storage slot).
    FulfillmentCenter,
    /// Customer return.
    Return,
    /// Warehouse receiving order.
    Wro,
    /// Support ticket (VAS requests).
    TicketNumber,
    /// Anything else.
    Unknown(String),
}

impl ReferenceType {
    pub fn as_str(&self) -> &str {
        match self {
            ReferenceType::Shipment => "Shipment",
            ReferenceType::FulfillmentCenter => "FC",
            ReferenceType::Return => "Return",
            ReferenceType::Wro => "WRO",
            ReferenceType::TicketNumber => "TicketNumber",
            ReferenceType::Unknown(raw) => raw,
        }
    }
}

impl From<String> for ReferenceType {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("Shipment") {
            ReferenceType::Shipment
        } else if trimmed.eq_ignore_ascii_case("FC") {
            ReferenceType::FulfillmentCenter
        } else if trimmed.eq_ignore_ascii_case("Return") {
            ReferenceType::Return
        } else if trimmed.eq_ignore_ascii_case("WRO") {
            ReferenceType::Wro
        } else if trimmed.eq_ignore_ascii_case("TicketNumber") {
            ReferenceType::TicketNumber
        } else {
            ReferenceType::Unknown(raw)
        }
    }
}

impl From<&str> for ReferenceType {
    fn from(raw: &str) -> Self {
        ReferenceType::from(raw.to_string())
    }
}

impl From<ReferenceType> for String {
    fn from(reference_type: ReferenceType) -> Self {
        reference_type.as_str().to_string()
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Billing Category
// =============================================================================

/// The nine invoice sections, in invoice order.
///
/// The derived `Ord` follows declaration order, which is also the order
/// summaries are printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BillingCategory {
    Fulfillment,
    Shipping,
    #[serde(rename = "Pick Fees")]
    PickFees,
    #[serde(rename = "B2B Fees")]
    B2bFees,
    Storage,
    Returns,
    Receiving,
    Credits,
    #[serde(rename = "Additional Services")]
    AdditionalServices,
}

impl BillingCategory {
    /// Every category, in invoice order.
    pub const ALL: [BillingCategory; 9] = [
        BillingCategory::Fulfillment,
        BillingCategory::Shipping,
        BillingCategory::PickFees,
        BillingCategory::B2bFees,
        BillingCategory::Storage,
        BillingCategory::Returns,
        BillingCategory::Receiving,
        BillingCategory::Credits,
        BillingCategory::AdditionalServices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCategory::Fulfillment => "Fulfillment",
            BillingCategory::Shipping => "Shipping",
            BillingCategory::PickFees => "Pick Fees",
            BillingCategory::B2bFees => "B2B Fees",
            BillingCategory::Storage => "Storage",
            BillingCategory::Returns => "Returns",
            BillingCategory::Receiving => "Receiving",
            BillingCategory::Credits => "Credits",
            BillingCategory::AdditionalServices => "Additional Services",
        }
    }

    /// Shipping and Fulfillment lines carry the shipment charge breakdown.
    #[inline]
    pub fn is_shipment(&self) -> bool {
        matches!(self, BillingCategory::Shipping | BillingCategory::Fulfillment)
    }
}

impl fmt::Display for BillingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BillingCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        BillingCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "billing_category".to_string(),
                allowed: BillingCategory::ALL
                    .iter()
                    .map(|c| c.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Order Category
// =============================================================================

/// Shipment order flavour; selects which order-category-scoped rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderCategory {
    #[default]
    Standard,
    #[serde(rename = "FBA")]
    Fba,
    #[serde(rename = "VAS")]
    Vas,
}

impl OrderCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderCategory::Standard => "Standard",
            OrderCategory::Fba => "FBA",
            OrderCategory::Vas => "VAS",
        }
    }
}

impl fmt::Display for OrderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STANDARD" => Ok(OrderCategory::Standard),
            "FBA" => Ok(OrderCategory::Fba),
            "VAS" => Ok(OrderCategory::Vas),
            _ => Err(ValidationError::NotAllowed {
                field: "order_category".to_string(),
                allowed: vec!["Standard".into(), "FBA".into(), "VAS".into()],
            }),
        }
    }
}

// =============================================================================
// Transaction (input)
// =============================================================================

/// Decomposed shipping costs, filled in later by an external feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingCostBreakdown {
    #[serde(default, deserialize_with = "money::deserialize_lenient")]
    pub base_cost: Money,
    #[serde(default, deserialize_with = "money::deserialize_lenient")]
    pub surcharge: Money,
    #[serde(default, deserialize_with = "money::deserialize_lenient")]
    pub insurance_cost: Money,
}

/// A raw fee record from the provider.
///
/// ## Note
/// `cost` is deserialized leniently: anything non-numeric becomes zero
/// (and the record is then skipped as a zero-cost row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub client_id: String,
    pub reference_type: ReferenceType,
    pub reference_id: String,
    pub fee_type: String,
    #[serde(deserialize_with = "money::deserialize_lenient")]
    pub cost: Money,
    #[serde(default)]
    pub shipping_costs: Option<ShippingCostBreakdown>,
    pub charge_date: NaiveDate,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Transaction {
    /// Reads a string detail under any of the given keys.
    ///
    /// The first non-empty value wins; numbers are stringified.
    pub fn detail_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.details.get(*key)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// Shipment attributes from the order system, used only for rule matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentAttributes {
    pub shipment_id: String,
    pub ship_option_id: Option<String>,
    pub weight_oz: Option<Decimal>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub order_category: Option<OrderCategory>,
}

// =============================================================================
// Fee Details (tagged union)
// =============================================================================

/// Typed transaction extras, built once by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeDetails {
    Shipping(ShippingDetails),
    Storage(StorageDetails),
    Credit(CreditDetails),
    Return(ReturnDetails),
    Receiving(ReceivingDetails),
    Service(ServiceDetails),
    Unclassified,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub order_category: OrderCategory,
    pub ship_option: Option<String>,
    pub carrier: Option<String>,
    pub tracking_id: Option<String>,
    pub is_refund: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDetails {
    pub facility: Option<String>,
    pub inventory_id: Option<String>,
    pub location_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditDetails {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDetails {
    pub return_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingDetails {
    pub placement_program: bool,
}

/// Sub-family of an additional-service fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    B2b,
    Pick,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub kind: ServiceKind,
}

// =============================================================================
// Line Item (output)
// =============================================================================

/// Which source record family a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    Shipments,
    ShipmentFees,
    Storage,
    Returns,
    Receiving,
    Credits,
    AdditionalServices,
}

/// How a line's markup was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupSource {
    /// Matched through the rule set.
    Rule,
    /// Credit that reused its shipment's markup.
    InheritedFromShipment,
    /// No rule matched; billed at cost.
    None,
}

/// Display-only charge breakdown for shipment lines.
///
/// Each component is rounded on its own and is not required to add up to
/// the line's `billed_amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCharges {
    pub base_charge: Money,
    pub total_charge: Money,
    pub insurance_charge: Money,
}

/// The unit of invoice output.
///
/// ## Amount Relationships
/// ```text
/// billed_amount = base_amount + markup_applied + surcharge + insurance_cost
///                 (surcharge/insurance only on shipment lines)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Source transaction id.
    pub id: String,
    pub source_table: SourceTable,
    pub client_id: String,
    pub reference_type: ReferenceType,
    pub reference_id: String,
    pub fee_type: String,
    pub category: BillingCategory,
    pub description: String,
    pub transaction_date: NaiveDate,
    pub base_amount: Money,
    pub surcharge: Option<Money>,
    pub insurance_cost: Option<Money>,
    pub markup_applied: Money,
    pub billed_amount: Money,
    /// Fraction (0.18 for 18%). `None` when a fixed-amount rule applied.
    pub markup_percentage: Option<Decimal>,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub markup_source: MarkupSource,
    pub shipment_charges: Option<ShipmentCharges>,
    pub details: FeeDetails,
}

impl LineItem {
    /// Surcharge plus insurance (zero when absent).
    pub fn pass_through(&self) -> Money {
        self.surcharge.unwrap_or_default() + self.insurance_cost.unwrap_or_default()
    }

    /// Credits that point at a shipment may inherit that shipment's markup.
    #[inline]
    pub fn is_shipment_credit(&self) -> bool {
        self.category == BillingCategory::Credits
            && self.reference_type == ReferenceType::Shipment
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
