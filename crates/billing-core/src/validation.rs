//! # Validation Module
//!
//! Checks applied to markup rules and policy values before they enter a
//! pricing run.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                       │
//! │  ├── Types and enums                                                    │
//! │  └── Lenient amounts (never fail, coerce to zero)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Rule shape (names, ranges, percentages)                            │
//! │  └── Policy values (tolerances, thresholds)                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL constraints                                               │
//! │  └── CHECK constraints on markup_type                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::rules::{MarkupRule, MarkupType, RuleConditions};
use crate::{MAX_PERCENTAGE_MARKUP, MIN_PERCENTAGE_MARKUP};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a rule name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use billing_core::validation::validate_rule_name;
///
/// assert!(validate_rule_name("Ground shipping 18%").is_ok());
/// assert!(validate_rule_name("  ").is_err());
/// ```
pub fn validate_rule_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an identifier (rule, client, shipment).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a rule's markup value.
///
/// ## Rules
/// - Percentage: between -100 and 1000 (a -100% rule bills zero)
/// - Fixed amount: any value
pub fn validate_markup_value(markup_type: MarkupType, value: Decimal) -> ValidationResult<()> {
    if markup_type == MarkupType::Percentage
        && (value < MIN_PERCENTAGE_MARKUP || value > MAX_PERCENTAGE_MARKUP)
    {
        return Err(ValidationError::OutOfRange {
            field: "markup_value".to_string(),
            min: MIN_PERCENTAGE_MARKUP.to_string(),
            max: MAX_PERCENTAGE_MARKUP.to_string(),
        });
    }
    Ok(())
}

/// Validates the structured conditions of a rule.
///
/// ## Rules
/// - Weight bounds are non-negative
/// - When both bounds are set, min < max (the range is `[min, max)`)
/// - List entries are non-empty
pub fn validate_conditions(conditions: &RuleConditions) -> ValidationResult<()> {
    for (field, bound) in [
        ("weight_min_oz", conditions.weight_min_oz),
        ("weight_max_oz", conditions.weight_max_oz),
    ] {
        if bound.is_some_and(|b| b < Decimal::ZERO) {
            return Err(ValidationError::MustNotBeNegative {
                field: field.to_string(),
            });
        }
    }

    if let (Some(min), Some(max)) = (conditions.weight_min_oz, conditions.weight_max_oz) {
        if min >= max {
            return Err(ValidationError::InvalidFormat {
                field: "weight range".to_string(),
                reason: format!("min {} must be below max {}", min, max),
            });
        }
    }

    for (field, list) in [
        ("states", &conditions.states),
        ("countries", &conditions.countries),
        ("ship_options", &conditions.ship_options),
    ] {
        if list.iter().flatten().any(|v| v.trim().is_empty()) {
            return Err(ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: "entries must not be empty".to_string(),
            });
        }
    }

    Ok(())
}

/// Validates a tolerance or threshold.
pub fn validate_tolerance(field: &str, value: Decimal) -> ValidationResult<()> {
    if value < Decimal::ZERO {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Rule Validator
// =============================================================================

/// Validates a whole rule before it is stored or used.
///
/// ## Example
/// ```rust,no_run
/// use billing_core::validation::validate_rule;
/// # fn load() -> billing_core::rules::MarkupRule { unimplemented!() }
///
/// let rule = load();
/// validate_rule(&rule).unwrap();
/// ```
pub fn validate_rule(rule: &MarkupRule) -> CoreResult<()> {
    let invalid = |err: ValidationError| CoreError::InvalidRule {
        rule_id: rule.id.clone(),
        reason: err.to_string(),
    };

    validate_id("id", &rule.id)?;
    validate_rule_name(&rule.name).map_err(invalid)?;
    validate_markup_value(rule.markup_type, rule.markup_value).map_err(invalid)?;

    if let Some(conditions) = &rule.conditions {
        validate_conditions(conditions).map_err(invalid)?;
    }

    if let Some(to) = rule.effective_to {
        if to < rule.effective_from {
            return Err(invalid(ValidationError::InvalidFormat {
                field: "effective range".to_string(),
                reason: format!("ends {} before it starts {}", to, rule.effective_from),
            }));
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::rule;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_rule_name() {
        assert!(validate_rule_name("Ground 18%").is_ok());
        assert!(validate_rule_name("").is_err());
        assert!(validate_rule_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_markup_value() {
        assert!(validate_markup_value(MarkupType::Percentage, dec!(18)).is_ok());
        assert!(validate_markup_value(MarkupType::Percentage, dec!(-100)).is_ok());
        assert!(validate_markup_value(MarkupType::Percentage, dec!(-101)).is_err());
        assert!(validate_markup_value(MarkupType::Percentage, dec!(1000.01)).is_err());
        assert!(validate_markup_value(MarkupType::FixedAmount, dec!(5000)).is_ok());
    }

    #[test]
    fn test_validate_conditions() {
        let ok = RuleConditions {
            weight_min_oz: Some(dec!(80)),
            weight_max_oz: Some(dec!(160)),
            ..Default::default()
        };
        assert!(validate_conditions(&ok).is_ok());

        let inverted = RuleConditions {
            weight_min_oz: Some(dec!(160)),
            weight_max_oz: Some(dec!(80)),
            ..Default::default()
        };
        assert!(validate_conditions(&inverted).is_err());

        let negative = RuleConditions {
            weight_min_oz: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(validate_conditions(&negative).is_err());

        let blank_state = RuleConditions {
            states: Some(vec!["CA".to_string(), " ".to_string()]),
            ..Default::default()
        };
        assert!(validate_conditions(&blank_state).is_err());
    }

    #[test]
    fn test_validate_rule() {
        assert!(validate_rule(&rule("ok", dec!(18))).is_ok());

        let mut backwards = rule("backwards", dec!(18));
        backwards.effective_to = Some(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let err = validate_rule(&backwards).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule { ref rule_id, .. } if rule_id == "backwards"));

        let mut unnamed = rule("unnamed", dec!(18));
        unnamed.name = String::new();
        assert!(validate_rule(&unnamed).is_err());

        let mut no_id = rule("", dec!(18));
        no_id.name = "named".to_string();
        assert!(matches!(validate_rule(&no_id), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_validate_tolerance() {
        assert!(validate_tolerance("tolerance", dec!(0)).is_ok());
        assert!(validate_tolerance("tolerance", dec!(0.005)).is_ok());
        assert!(validate_tolerance("tolerance", dec!(-0.01)).is_err());
    }
}
