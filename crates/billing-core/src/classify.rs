//! # Transaction Classifier
//!
//! Maps a raw fee record onto one of the nine invoice categories and builds
//! the unpriced line item for it.
//!
//! ## Decision Table (first match wins)
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │  fee = "Credit"                                  → Credits               │
//! │  Shipment + fee = "Shipping"                     → Fulfillment (FBA)     │
//! │                                                    or Shipping           │
//! │  Shipment + additional-service fee               → B2B / Pick / Addl     │
//! │  Shipment + anything else                        → Additional (warn)     │
//! │  FC                                              → Storage               │
//! │  Return                                          → Returns               │
//! │  WRO + "Inventory Placement Program Fee"         → Additional Services   │
//! │  WRO, or fee contains "Receiving"                → Receiving             │
//! │  TicketNumber + additional-service fee           → B2B / Pick / Addl     │
//! │  otherwise                                       → Additional (warn)     │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Zero-cost records are skipped before classification. Every other record
//! yields exactly one line item; unknown pairings land in the catch-all.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::money::Money;
use crate::types::{
    BillingCategory, CreditDetails, FeeDetails, LineItem, MarkupSource, OrderCategory,
    ReceivingDetails, ReferenceType, ReturnDetails, ServiceDetails, ServiceKind, ShippingDetails,
    SourceTable, StorageDetails, Transaction,
};

// =============================================================================
// Fee Type Constants
// =============================================================================

pub const CREDIT_FEE: &str = "Credit";
pub const SHIPPING_FEE: &str = "Shipping";
pub const PLACEMENT_PROGRAM_FEE: &str = "Inventory Placement Program Fee";

/// Fee types billed as additional services on shipments and tickets.
pub const ADDITIONAL_SERVICE_FEE_TYPES: [&str; 18] = [
    "Per Pick Fee",
    "Additional Pick Fee",
    "B2B - Each Pick Fee",
    "B2B - Case Pick Fee",
    "B2B - Pallet Pick Fee",
    "B2B - Label Fee",
    "B2B - Order Fee",
    "B2B - Pallet Material Fee",
    "B2B - Pallet Pack Fee",
    "B2B - Supplies",
    "Address Correction",
    "Kitting Fee",
    "VAS - Paid Requests",
    "Warehousing Fee",
    "Multi-Hub IQ Fee",
    "Signature Required Fee",
    "Return to Sender Fee",
    "Duty and Taxes",
];

// Detail-map aliases
const ORDER_CATEGORY_KEYS: &[&str] = &["order_category", "OrderCategory", "orderCategory"];
const CREDIT_REASON_KEYS: &[&str] = &["comment", "Comment", "reason", "CreditReason"];
const SHIP_OPTION_KEYS: &[&str] = &["ship_option", "ShipOption", "shipOption"];
const CARRIER_KEYS: &[&str] = &["carrier", "Carrier"];
const TRACKING_KEYS: &[&str] = &["tracking_id", "TrackingId", "trackingId"];
const LOCATION_TYPE_KEYS: &[&str] = &["location_type", "LocationType", "locationType"];
const INVENTORY_KEYS: &[&str] = &["inventory_id", "InventoryId", "inventoryId"];
const RETURN_REASON_KEYS: &[&str] = &["return_reason", "ReturnReason", "returnReason"];

// =============================================================================
// Fee Class
// =============================================================================

/// Closed classification of a `(reference type, fee type)` pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeClass {
    Credit,
    ShipmentShipping { fba: bool },
    ShipmentService(ServiceKind),
    /// Shipment fee type outside the known set.
    ShipmentUnknown,
    Storage,
    Return,
    PlacementProgram,
    Receiving,
    TicketService(ServiceKind),
    /// Nothing else matched.
    Unclassified,
}

impl FeeClass {
    /// Classifies a transaction. Pure: same input, same class.
    pub fn of(tx: &Transaction) -> FeeClass {
        let fee_type = tx.fee_type.trim();

        if fee_type == CREDIT_FEE {
            return FeeClass::Credit;
        }

        match &tx.reference_type {
            ReferenceType::Shipment => {
                if fee_type == SHIPPING_FEE {
                    FeeClass::ShipmentShipping {
                        fba: order_category(tx) == OrderCategory::Fba,
                    }
                } else if let Some(kind) = service_kind(fee_type) {
                    FeeClass::ShipmentService(kind)
                } else {
                    FeeClass::ShipmentUnknown
                }
            }
            ReferenceType::FulfillmentCenter => FeeClass::Storage,
            ReferenceType::Return => FeeClass::Return,
            ReferenceType::Wro if fee_type == PLACEMENT_PROGRAM_FEE => FeeClass::PlacementProgram,
            ReferenceType::Wro => FeeClass::Receiving,
            _ if fee_type.contains("Receiving") => FeeClass::Receiving,
            ReferenceType::TicketNumber => match service_kind(fee_type) {
                Some(kind) => FeeClass::TicketService(kind),
                None => FeeClass::Unclassified,
            },
            _ => FeeClass::Unclassified,
        }
    }

    pub fn category(&self) -> BillingCategory {
        match self {
            FeeClass::Credit => BillingCategory::Credits,
            FeeClass::ShipmentShipping { fba: true } => BillingCategory::Fulfillment,
            FeeClass::ShipmentShipping { fba: false } => BillingCategory::Shipping,
            FeeClass::ShipmentService(kind) | FeeClass::TicketService(kind) => match kind {
                ServiceKind::B2b => BillingCategory::B2bFees,
                ServiceKind::Pick => BillingCategory::PickFees,
                ServiceKind::Other => BillingCategory::AdditionalServices,
            },
            FeeClass::ShipmentUnknown => BillingCategory::AdditionalServices,
            FeeClass::Storage => BillingCategory::Storage,
            FeeClass::Return => BillingCategory::Returns,
            FeeClass::PlacementProgram => BillingCategory::AdditionalServices,
            FeeClass::Receiving => BillingCategory::Receiving,
            FeeClass::Unclassified => BillingCategory::AdditionalServices,
        }
    }

    pub fn source_table(&self) -> SourceTable {
        match self {
            FeeClass::Credit => SourceTable::Credits,
            FeeClass::ShipmentShipping { .. } => SourceTable::Shipments,
            FeeClass::ShipmentService(_) | FeeClass::ShipmentUnknown => SourceTable::ShipmentFees,
            FeeClass::Storage => SourceTable::Storage,
            FeeClass::Return => SourceTable::Returns,
            FeeClass::PlacementProgram | FeeClass::Receiving => SourceTable::Receiving,
            FeeClass::TicketService(_) | FeeClass::Unclassified => SourceTable::AdditionalServices,
        }
    }

    /// False for pairings that fell through to a catch-all.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, FeeClass::ShipmentUnknown | FeeClass::Unclassified)
    }
}

/// Sub-family of an additional-service fee, or `None` if not in the set.
pub fn service_kind(fee_type: &str) -> Option<ServiceKind> {
    let fee_type = fee_type.trim();
    if !ADDITIONAL_SERVICE_FEE_TYPES.contains(&fee_type) {
        return None;
    }
    Some(if fee_type.starts_with("B2B") {
        ServiceKind::B2b
    } else if fee_type.contains("Pick") {
        ServiceKind::Pick
    } else {
        ServiceKind::Other
    })
}

fn order_category(tx: &Transaction) -> OrderCategory {
    tx.detail_str(ORDER_CATEGORY_KEYS)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default()
}

// =============================================================================
// Line Item Construction
// =============================================================================

/// Builds the unpriced line item for a transaction.
///
/// Returns `None` only for zero-cost records. The shell is billed at cost
/// (`markup_source = None`) until the pricing stage replaces it.
pub fn classify(tx: &Transaction) -> Option<LineItem> {
    if tx.cost.is_zero() {
        debug!(transaction_id = %tx.id, fee_type = %tx.fee_type, "Skipping zero-cost transaction");
        return None;
    }

    let class = FeeClass::of(tx);
    let category = class.category();

    if !class.is_recognized() {
        warn!(
            transaction_id = %tx.id,
            reference_type = %tx.reference_type,
            fee_type = %tx.fee_type,
            category = %category,
            "Unrecognized fee pairing billed as catch-all"
        );
    }

    let details = build_details(tx, class);
    let description = describe(tx, &details);

    let (base_amount, surcharge, insurance_cost) = match (&tx.shipping_costs, category.is_shipment()) {
        (Some(costs), true) => (costs.base_cost, Some(costs.surcharge), Some(costs.insurance_cost)),
        _ => (tx.cost, None, None),
    };
    let billed_amount = base_amount
        + surcharge.unwrap_or_default()
        + insurance_cost.unwrap_or_default();

    Some(LineItem {
        id: tx.id.clone(),
        source_table: class.source_table(),
        client_id: tx.client_id.clone(),
        reference_type: tx.reference_type.clone(),
        reference_id: tx.reference_id.clone(),
        fee_type: tx.fee_type.clone(),
        category,
        description,
        transaction_date: tx.charge_date,
        base_amount,
        surcharge,
        insurance_cost,
        markup_applied: Money::zero(),
        billed_amount,
        markup_percentage: Some(Decimal::ZERO),
        rule_id: None,
        rule_name: None,
        markup_source: MarkupSource::None,
        shipment_charges: None,
        details,
    })
}

/// Classifies a batch, dropping zero-cost records and keeping input order.
pub fn classify_batch(transactions: &[Transaction]) -> Vec<LineItem> {
    transactions.iter().filter_map(classify).collect()
}

fn build_details(tx: &Transaction, class: FeeClass) -> FeeDetails {
    match class {
        FeeClass::Credit => FeeDetails::Credit(CreditDetails {
            reason: tx.detail_str(CREDIT_REASON_KEYS),
        }),
        FeeClass::ShipmentShipping { .. } => FeeDetails::Shipping(ShippingDetails {
            order_category: order_category(tx),
            ship_option: tx.detail_str(SHIP_OPTION_KEYS),
            carrier: tx.detail_str(CARRIER_KEYS),
            tracking_id: tx.detail_str(TRACKING_KEYS),
            is_refund: tx.cost.is_negative(),
        }),
        FeeClass::Storage => FeeDetails::Storage(storage_details(tx)),
        FeeClass::Return => FeeDetails::Return(ReturnDetails {
            return_reason: tx.detail_str(RETURN_REASON_KEYS),
        }),
        FeeClass::PlacementProgram => FeeDetails::Receiving(ReceivingDetails {
            placement_program: true,
        }),
        FeeClass::Receiving => FeeDetails::Receiving(ReceivingDetails {
            placement_program: false,
        }),
        FeeClass::ShipmentService(kind) | FeeClass::TicketService(kind) => {
            FeeDetails::Service(ServiceDetails { kind })
        }
        FeeClass::ShipmentUnknown | FeeClass::Unclassified => FeeDetails::Unclassified,
    }
}

/// Parses `facility-inventory-locationType`, then falls back to the map.
fn storage_details(tx: &Transaction) -> StorageDetails {
    let parts: Vec<&str> = tx.reference_id.trim().splitn(3, '-').collect();
    if let [facility, inventory, location_type] = parts.as_slice() {
        if !facility.is_empty() && !inventory.is_empty() && !location_type.is_empty() {
            return StorageDetails {
                facility: Some(facility.to_string()),
                inventory_id: Some(inventory.to_string()),
                location_type: location_type.to_string(),
            };
        }
    }

    StorageDetails {
        facility: None,
        inventory_id: tx.detail_str(INVENTORY_KEYS),
        location_type: tx
            .detail_str(LOCATION_TYPE_KEYS)
            .unwrap_or_else(|| "Unknown".to_string()),
    }
}

fn describe(tx: &Transaction, details: &FeeDetails) -> String {
    match details {
        FeeDetails::Credit(credit) => credit
            .reason
            .clone()
            .unwrap_or_else(|| CREDIT_FEE.to_string()),
        FeeDetails::Shipping(shipping) => {
            let label = match shipping.ship_option.as_ref().or(shipping.carrier.as_ref()) {
                Some(option) => format!("Shipping - {}", option),
                None => format!("Shipment {}", tx.reference_id),
            };
            if shipping.is_refund {
                format!("Refund: {}", label)
            } else {
                label
            }
        }
        FeeDetails::Storage(storage) => format!("Storage - {}", storage.location_type),
        FeeDetails::Return(_) => format!("Return {}", tx.reference_id),
        FeeDetails::Receiving(receiving) if !receiving.placement_program => {
            format!("Receiving - WRO {}", tx.reference_id)
        }
        _ => tx.fee_type.trim().to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::ShippingCostBreakdown;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    pub(crate) fn tx(id: &str, reference_type: &str, fee_type: &str, cost: Decimal) -> Transaction {
        Transaction {
            id: id.to_string(),
            client_id: "client-1".to_string(),
            reference_type: ReferenceType::from(reference_type),
            reference_id: format!("REF-{}", id),
            fee_type: fee_type.to_string(),
            cost: Money::new(cost),
            shipping_costs: None,
            charge_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            details: BTreeMap::new(),
        }
    }

    fn with_detail(mut t: Transaction, key: &str, value: &str) -> Transaction {
        t.details.insert(key.to_string(), serde_json::json!(value));
        t
    }

    fn category_of(t: &Transaction) -> BillingCategory {
        classify(t).unwrap().category
    }

    #[test]
    fn test_credit_wins_over_reference_type() {
        let t = with_detail(tx("1", "Shipment", "Credit", dec!(-5)), "comment", "Late delivery");
        let line = classify(&t).unwrap();
        assert_eq!(line.category, BillingCategory::Credits);
        assert_eq!(line.description, "Late delivery");
        assert!(line.is_shipment_credit());

        let bare = tx("2", "TicketNumber", "Credit", dec!(-5));
        assert_eq!(classify(&bare).unwrap().description, "Credit");
    }

    #[test]
    fn test_shipping_vs_fulfillment() {
        let standard = tx("1", "Shipment", "Shipping", dec!(8));
        assert_eq!(category_of(&standard), BillingCategory::Shipping);

        let fba = with_detail(tx("2", "Shipment", "Shipping", dec!(8)), "OrderCategory", "FBA");
        assert_eq!(category_of(&fba), BillingCategory::Fulfillment);
    }

    #[test]
    fn test_refund_prefix_same_category() {
        let refund = with_detail(tx("1", "Shipment", "Shipping", dec!(-8)), "ship_option", "Ground");
        let line = classify(&refund).unwrap();
        assert_eq!(line.category, BillingCategory::Shipping);
        assert_eq!(line.description, "Refund: Shipping - Ground");

        let charge = tx("2", "Shipment", "Shipping", dec!(8));
        assert_eq!(classify(&charge).unwrap().description, "Shipment REF-2");
    }

    #[test]
    fn test_service_sub_rule() {
        assert_eq!(
            category_of(&tx("1", "Shipment", "B2B - Label Fee", dec!(1))),
            BillingCategory::B2bFees
        );
        assert_eq!(
            category_of(&tx("2", "Shipment", "Per Pick Fee", dec!(1))),
            BillingCategory::PickFees
        );
        assert_eq!(
            category_of(&tx("3", "Shipment", "Kitting Fee", dec!(1))),
            BillingCategory::AdditionalServices
        );
        assert_eq!(
            category_of(&tx("4", "TicketNumber", "B2B - Case Pick Fee", dec!(1))),
            BillingCategory::B2bFees
        );
        assert_eq!(
            category_of(&tx("5", "TicketNumber", "VAS - Paid Requests", dec!(1))),
            BillingCategory::AdditionalServices
        );
    }

    #[test]
    fn test_unknown_shipment_fee_is_not_dropped() {
        let t = tx("1", "Shipment", "Mystery Fee", dec!(3));
        assert_eq!(FeeClass::of(&t), FeeClass::ShipmentUnknown);
        let line = classify(&t).unwrap();
        assert_eq!(line.category, BillingCategory::AdditionalServices);
        assert_eq!(line.details, FeeDetails::Unclassified);
        assert_eq!(line.description, "Mystery Fee");
    }

    #[test]
    fn test_storage_reference_parsing() {
        let mut t = tx("1", "FC", "Storage Fee", dec!(12));
        t.reference_id = "NJ1-88231-Pallet".to_string();
        let line = classify(&t).unwrap();
        assert_eq!(line.category, BillingCategory::Storage);
        assert_eq!(line.description, "Storage - Pallet");
        match line.details {
            FeeDetails::Storage(storage) => {
                assert_eq!(storage.facility.as_deref(), Some("NJ1"));
                assert_eq!(storage.inventory_id.as_deref(), Some("88231"));
            }
            other => panic!("unexpected details {:?}", other),
        }

        let mut t = tx("2", "FC", "Storage Fee", dec!(12));
        t.reference_id = "slot-17".to_string();
        let t = with_detail(t, "LocationType", "Shelf");
        assert_eq!(classify(&t).unwrap().description, "Storage - Shelf");

        let mut t = tx("3", "FC", "Storage Fee", dec!(12));
        t.reference_id = "17".to_string();
        assert_eq!(classify(&t).unwrap().description, "Storage - Unknown");
    }

    #[test]
    fn test_storage_location_type_keeps_hyphens() {
        let mut t = tx("1", "FC", "Storage Fee", dec!(12));
        t.reference_id = "NJ1-88231-Half-Pallet".to_string();
        assert_eq!(classify(&t).unwrap().description, "Storage - Half-Pallet");
    }

    #[test]
    fn test_placement_program_carve_out() {
        let placement = tx("1", "WRO", PLACEMENT_PROGRAM_FEE, dec!(40));
        assert_eq!(category_of(&placement), BillingCategory::AdditionalServices);

        let receiving = tx("2", "WRO", "WRO Receiving Fee", dec!(40));
        let line = classify(&receiving).unwrap();
        assert_eq!(line.category, BillingCategory::Receiving);
        assert_eq!(line.description, "Receiving - WRO REF-2");
    }

    #[test]
    fn test_receiving_by_fee_type_substring() {
        let t = tx("1", "Pallet", "Receiving Labor", dec!(10));
        assert_eq!(category_of(&t), BillingCategory::Receiving);
    }

    #[test]
    fn test_returns() {
        let line = classify(&tx("9", "Return", "Return Processing Fee", dec!(3))).unwrap();
        assert_eq!(line.category, BillingCategory::Returns);
        assert_eq!(line.description, "Return REF-9");
    }

    #[test]
    fn test_zero_cost_is_skipped() {
        assert!(classify(&tx("1", "Shipment", "Shipping", Decimal::ZERO)).is_none());
    }

    #[test]
    fn test_idempotent_classification() {
        let samples = vec![
            with_detail(tx("1", "Shipment", "Shipping", dec!(8)), "OrderCategory", "FBA"),
            tx("2", "FC", "Storage Fee", dec!(12)),
            tx("3", "Shipment", "Mystery Fee", dec!(3)),
            tx("4", "Other", "Other", dec!(-1)),
        ];
        for t in &samples {
            let first = classify(t).unwrap();
            let second = classify(t).unwrap();
            assert_eq!(first.category, second.category);
            assert_eq!(first.description, second.description);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_catch_all_completeness() {
        let reference_types = ["Shipment", "FC", "Return", "WRO", "TicketNumber", "Pallet", ""];
        let fee_types = [
            "Shipping",
            "Credit",
            "Per Pick Fee",
            "B2B - Supplies",
            PLACEMENT_PROGRAM_FEE,
            "WRO Receiving Fee",
            "Mystery Fee",
            "",
        ];

        let mut transactions = Vec::new();
        for (i, reference_type) in reference_types.iter().enumerate() {
            for (j, fee_type) in fee_types.iter().enumerate() {
                let id = format!("{}-{}", i, j);
                transactions.push(tx(&id, reference_type, fee_type, dec!(1.5)));
            }
        }

        let lines = classify_batch(&transactions);
        assert_eq!(lines.len(), transactions.len());
        for (line, t) in lines.iter().zip(&transactions) {
            assert_eq!(line.id, t.id);
        }
    }

    #[test]
    fn test_shipment_breakdown_splits_amounts() {
        let mut t = tx("1", "Shipment", "Shipping", dec!(12.50));
        t.shipping_costs = Some(ShippingCostBreakdown {
            base_cost: Money::from_cents(1000),
            surcharge: Money::from_cents(150),
            insurance_cost: Money::from_cents(100),
        });
        let line = classify(&t).unwrap();
        assert_eq!(line.base_amount, Money::from_cents(1000));
        assert_eq!(line.surcharge, Some(Money::from_cents(150)));
        assert_eq!(line.billed_amount, Money::from_cents(1250));

        // Breakdown is ignored outside shipment categories.
        let mut pick = tx("2", "Shipment", "Per Pick Fee", dec!(0.25));
        pick.shipping_costs = t.shipping_costs.clone();
        let line = classify(&pick).unwrap();
        assert_eq!(line.base_amount, Money::from_cents(25));
        assert!(line.surcharge.is_none());
    }
}
