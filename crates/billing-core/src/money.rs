//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    10.005 × 1.18 = 11.805899999999999  ❌ which way does it round?      │
//! │                                                                         │
//! │  Why not integer cents?                                                 │
//! │    Carrier costs arrive with sub-cent precision (10.005). Truncating    │
//! │    them to cents before the markup changes the invoice total.           │
//! │                                                                         │
//! │  OUR SOLUTION: Exact decimals, rounded only where the invoice rounds    │
//! │    10.005 × 1.18 = 11.80590 exactly → 11.81                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use billing_core::money::{Money, RoundingMode};
//! use rust_decimal::Decimal;
//!
//! let cost = Money::new(Decimal::new(10005, 3)); // $10.005
//! let billed = cost.scale(Decimal::new(118, 2)).round_cents(RoundingMode::default());
//! assert_eq!(billed, Money::from_cents(1181));
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use tracing::warn;

use crate::error::ValidationError;

/// Number of decimal places on an invoice.
pub const CENT_PLACES: u32 = 2;

// =============================================================================
// Rounding Mode
// =============================================================================

/// How a value exactly halfway between two cents is rounded.
///
/// ## Half Away From Zero vs Half Even
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────┐
/// │  value     HalfAwayFromZero     HalfEven (bankers)                  │
/// │  ───────   ────────────────     ──────────────────                  │
/// │   0.125          0.13                 0.12                          │
/// │   0.135          0.14                 0.14                          │
/// │  -0.125         -0.13                -0.12                          │
/// └─────────────────────────────────────────────────────────────────────┘
/// ```
///
/// Spreadsheet exports are often produced with bankers rounding, so the
/// mode is configuration rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// 0.125 → 0.13, -0.125 → -0.13.
    #[default]
    HalfAwayFromZero,
    /// 0.125 → 0.12, 0.135 → 0.14.
    HalfEven,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfAwayFromZero => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }

    /// Rounds a raw decimal to `dp` places.
    #[inline]
    pub fn round(self, value: Decimal, dp: u32) -> Decimal {
        value.round_dp_with_strategy(dp, self.strategy())
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingMode::HalfAwayFromZero => write!(f, "half_away_from_zero"),
            RoundingMode::HalfEven => write!(f, "half_even"),
        }
    }
}

impl FromStr for RoundingMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "half_away_from_zero" | "half_up" | "away_from_zero" => {
                Ok(RoundingMode::HalfAwayFromZero)
            }
            "half_even" | "bankers" => Ok(RoundingMode::HalfEven),
            _ => Err(ValidationError::NotAllowed {
                field: "rounding".to_string(),
                allowed: vec!["half_away_from_zero".to_string(), "half_even".to_string()],
            }),
        }
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A signed monetary value in the provider's currency.
///
/// ## Design Decisions
/// - **Decimal (signed)**: credits and refunds are negative
/// - **Unrounded by default**: raw costs keep the precision they arrived with;
///   callers round with [`Money::round_cents`] at the documented points
/// - **Transparent serde**: serializes exactly like the inner `Decimal`
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Transaction.cost ──► LineItem.base_amount ──┬──► markup_applied        │
/// │                                              └──► billed_amount         │
/// │                                                        │                │
/// │  Reconciliation ◄──────────────────────────────────────┘                │
/// │       │                                                                 │
/// │       └──► Summary (subtotal, markup, total per category)               │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a raw decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a Money value from whole cents.
    ///
    /// ## Example
    /// ```rust
    /// use billing_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.to_string(), "$10.99");
    /// ```
    #[inline]
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, CENT_PLACES))
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Returns the inner decimal.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value.
    #[inline]
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Rounds to whole cents with the given mode.
    ///
    /// ## Example
    /// ```rust
    /// use billing_core::money::{Money, RoundingMode};
    /// use rust_decimal::Decimal;
    ///
    /// let raw = Money::new(Decimal::new(-125, 3)); // -0.125
    /// assert_eq!(raw.round_cents(RoundingMode::HalfAwayFromZero), Money::from_cents(-13));
    /// assert_eq!(raw.round_cents(RoundingMode::HalfEven), Money::from_cents(-12));
    /// ```
    #[inline]
    pub fn round_cents(&self, mode: RoundingMode) -> Self {
        Money(mode.round(self.0, CENT_PLACES))
    }

    /// Multiplies by a raw factor without rounding.
    #[inline]
    pub fn scale(&self, factor: Decimal) -> Self {
        Money(self.0 * factor)
    }

    /// True when both values differ by at most `tolerance`.
    #[inline]
    pub fn approx_eq(&self, other: Money, tolerance: Decimal) -> bool {
        (self.0 - other.0).abs() <= tolerance
    }

    /// Parses a provider amount, coercing anything non-numeric to zero.
    ///
    /// Accepts `"12.50"`, `"-3"`, `"$1,204.10"` and scientific notation.
    /// A malformed value is logged and becomes `$0.00` so that one bad row
    /// never fails a whole batch.
    pub fn parse_lenient(raw: &str) -> Self {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '$' && *c != ',')
            .collect();

        if cleaned.is_empty() {
            warn!(value = %raw, "Empty amount coerced to zero");
            return Money::zero();
        }

        match Decimal::from_str(&cleaned).or_else(|_| Decimal::from_scientific(&cleaned)) {
            Ok(amount) => Money(amount),
            Err(_) => {
                warn!(value = %raw, "Non-numeric amount coerced to zero");
                Money::zero()
            }
        }
    }
}

// =============================================================================
// Lenient Deserialization
// =============================================================================

/// Serde helper for cost fields fed by external systems.
///
/// Numbers and numeric strings are accepted; `null`, booleans, objects and
/// unparseable strings become zero with a warning.
///
/// ## Usage
/// ```rust
/// use billing_core::money::{self, Money};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Row {
///     #[serde(deserialize_with = "money::deserialize_lenient")]
///     cost: Money,
/// }
///
/// let row: Row = serde_json::from_str(r#"{"cost": "n/a"}"#).unwrap();
/// assert!(row.cost.is_zero());
/// ```
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(money_from_json(&value))
}

/// Converts an arbitrary JSON value into Money (see [`deserialize_lenient`]).
pub fn money_from_json(value: &serde_json::Value) -> Money {
    match value {
        serde_json::Value::Number(n) => Money::parse_lenient(&n.to_string()),
        serde_json::Value::String(s) => Money::parse_lenient(s),
        other => {
            warn!(value = %other, "Non-numeric amount coerced to zero");
            Money::zero()
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money rounded to cents, e.g. `$10.99` or `-$5.50`.
///
/// ## Note
/// Display always rounds half away from zero; it is for logs and
/// descriptions, never for arithmetic.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let cents = RoundingMode::HalfAwayFromZero.round(self.0.abs(), CENT_PLACES);
        write!(f, "{}${:.2}", sign, cents)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
