//! # Pricing Policy
//!
//! The handful of knobs the pure pipeline needs. Loaded from configuration
//! by billing-engine and passed down explicitly; nothing here is global.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::RoundingMode;
use crate::{DEFAULT_ALERT_THRESHOLD, DEFAULT_CREDIT_MATCH_TOLERANCE, DEFAULT_RECONCILE_TOLERANCE};

/// Pricing knobs threaded through every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Rounding applied wherever an amount is rounded to cents.
    pub rounding: RoundingMode,
    /// Max distance between |credit| and a shipment base to inherit its markup.
    pub credit_match_tolerance: Decimal,
    /// When false, fixed-amount rules matched by credits add nothing.
    pub fixed_markup_on_credits: bool,
    /// Smallest reconciliation diff that is applied.
    pub reconcile_tolerance: Decimal,
    /// Diffs above this are flagged for the caller.
    pub alert_threshold: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            rounding: RoundingMode::default(),
            credit_match_tolerance: DEFAULT_CREDIT_MATCH_TOLERANCE,
            fixed_markup_on_credits: true,
            reconcile_tolerance: DEFAULT_RECONCILE_TOLERANCE,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}
