//! # Engine Configuration
//!
//! Configuration management for invoice runs.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     BILLING_ROUNDING_MODE=half_even                                     │
//! │     BILLING_LOOKUP_CHUNK_SIZE=250                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/billing/billing.toml (Linux)                              │
//! │     ~/Library/Application Support/com.fulfillment.billing/billing.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     half-away-from-zero rounding, $0.01 credit match, 500-id chunks     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # billing.toml
//! [pricing]
//! rounding = "half_away_from_zero"   # or "half_even"
//! credit_match_tolerance = "0.01"
//! fixed_markup_on_credits = true
//!
//! [reconciliation]
//! tolerance = "0.005"
//! alert_threshold = "0.05"
//!
//! [lookups]
//! chunk_size = 500
//! timeout_secs = 120
//!
//! [database]
//! path = "billing.db"
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use billing_core::validation::validate_tolerance;
use billing_core::{
    PricingPolicy, RoundingMode, DEFAULT_ALERT_THRESHOLD, DEFAULT_CREDIT_MATCH_TOLERANCE,
    DEFAULT_RECONCILE_TOLERANCE,
};
use billing_db::DbConfig;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Pricing Settings
// =============================================================================

/// How line items are priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Rounding applied wherever an amount is rounded to cents.
    #[serde(default)]
    pub rounding: RoundingMode,

    /// Max distance between |credit| and the shipment's base amount for the
    /// credit to inherit the shipment's markup.
    #[serde(default = "default_credit_match_tolerance")]
    pub credit_match_tolerance: Decimal,

    /// Whether a fixed-amount rule matched by a credit is applied.
    /// Default: true
    #[serde(default = "default_true")]
    pub fixed_markup_on_credits: bool,
}

fn default_credit_match_tolerance() -> Decimal {
    DEFAULT_CREDIT_MATCH_TOLERANCE
}

fn default_true() -> bool {
    true
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            rounding: RoundingMode::default(),
            credit_match_tolerance: default_credit_match_tolerance(),
            fixed_markup_on_credits: true,
        }
    }
}

// =============================================================================
// Reconciliation Settings
// =============================================================================

/// Rounding reconciliation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    /// Smallest diff that is applied.
    #[serde(default = "default_reconcile_tolerance")]
    pub tolerance: Decimal,

    /// Diffs above this are logged as data-quality warnings.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: Decimal,
}

fn default_reconcile_tolerance() -> Decimal {
    DEFAULT_RECONCILE_TOLERANCE
}

fn default_alert_threshold() -> Decimal {
    DEFAULT_ALERT_THRESHOLD
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        ReconciliationSettings {
            tolerance: default_reconcile_tolerance(),
            alert_threshold: default_alert_threshold(),
        }
    }
}

// =============================================================================
// Lookup Settings
// =============================================================================

/// Collaborator lookup batching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupSettings {
    /// Ids per lookup query.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Upper bound for a whole run (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_chunk_size() -> usize {
    500
}

fn default_timeout() -> u64 {
    120
}

impl Default for LookupSettings {
    fn default() -> Self {
        LookupSettings {
            chunk_size: default_chunk_size(),
            timeout_secs: default_timeout(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// Where the SQLite collaborators live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "fulfillment", "billing")
        .map(|dirs| dirs.data_dir().join("billing.db"))
        .unwrap_or_else(|| PathBuf::from("billing.db"))
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub reconciliation: ReconciliationSettings,

    #[serde(default)]
    pub lookups: LookupSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (billing.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        let tolerances = [
            ("pricing.credit_match_tolerance", self.pricing.credit_match_tolerance),
            ("reconciliation.tolerance", self.reconciliation.tolerance),
            ("reconciliation.alert_threshold", self.reconciliation.alert_threshold),
        ];
        for (field, value) in tolerances {
            validate_tolerance(field, value).map_err(|e| EngineError::Config(e.to_string()))?;
        }

        if self.lookups.chunk_size == 0 {
            return Err(EngineError::Config(
                "lookups.chunk_size must be greater than 0".into(),
            ));
        }

        if self.lookups.timeout_secs == 0 {
            return Err(EngineError::Config(
                "lookups.timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(mode) = var("BILLING_ROUNDING_MODE") {
            match mode.parse::<RoundingMode>() {
                Ok(parsed) => {
                    debug!(mode = %parsed, "Overriding rounding mode from environment");
                    self.pricing.rounding = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown rounding mode in environment"),
            }
        }

        if let Some(raw) = var("BILLING_CREDIT_TOLERANCE") {
            match Decimal::from_str(raw.trim()) {
                Ok(value) => self.pricing.credit_match_tolerance = value,
                Err(_) => warn!(value = %raw, "Invalid BILLING_CREDIT_TOLERANCE, ignoring"),
            }
        }

        if let Some(raw) = var("BILLING_RECONCILE_ALERT") {
            match Decimal::from_str(raw.trim()) {
                Ok(value) => self.reconciliation.alert_threshold = value,
                Err(_) => warn!(value = %raw, "Invalid BILLING_RECONCILE_ALERT, ignoring"),
            }
        }

        if let Some(raw) = var("BILLING_LOOKUP_CHUNK_SIZE") {
            match raw.trim().parse::<usize>() {
                Ok(size) => {
                    debug!(chunk_size = size, "Overriding lookup chunk size from environment");
                    self.lookups.chunk_size = size;
                }
                Err(_) => warn!(value = %raw, "Invalid BILLING_LOOKUP_CHUNK_SIZE, ignoring"),
            }
        }

        if let Some(raw) = var("BILLING_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.lookups.timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Invalid BILLING_TIMEOUT_SECS, ignoring"),
            }
        }

        if let Some(path) = var("BILLING_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "fulfillment", "billing")
            .map(|dirs| dirs.config_dir().join("billing.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The pure pricing knobs consumed by billing-core.
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            rounding: self.pricing.rounding,
            credit_match_tolerance: self.pricing.credit_match_tolerance,
            fixed_markup_on_credits: self.pricing.fixed_markup_on_credits,
            reconcile_tolerance: self.reconciliation.tolerance,
            alert_threshold: self.reconciliation.alert_threshold,
        }
    }

    /// Database pool configuration for the configured path.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
    }

    /// Run timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.lookups.timeout_secs)
    }
}
