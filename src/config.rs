use crate::domain::driver::DriverProfile;
use crate::domain::money::Currency;
use crate::error::{CommissionError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration, deserialized from a JSON file. Every field has a
/// default so a missing file still yields a runnable (if empty) service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on any single persistence call.
    pub store_timeout_ms: u64,
    pub wallet: WalletConfig,
    pub receipt_retry: RetryConfig,
    /// Driver roster seeded into the in-memory directory at startup.
    pub drivers: Vec<DriverProfile>,
    /// Conversion rate table, one entry per directed currency pair.
    pub rates: Vec<RateEntry>,
}

/// Settings of the informational commission wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Percentage of delivered-order totals counted as earned commission.
    pub percent: Decimal,
    /// Fixed reporting currency of the wallet.
    pub primary_currency: Currency,
    /// Secondary display currency, derived from primary by a second lookup.
    pub secondary_currency: Currency,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            percent: Decimal::from(5),
            primary_currency: Currency::new("SAR"),
            secondary_currency: Currency::new("USD"),
        }
    }
}

/// Bounded exponential backoff, shared by the receipt worker and the
/// read-path retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// One directed conversion rate: `amount_in_from x rate = amount_in_to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateEntry {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
}

impl Config {
    const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| CommissionError::validation(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn store_timeout(&self) -> Duration {
        let ms = if self.store_timeout_ms == 0 {
            Self::DEFAULT_STORE_TIMEOUT_MS
        } else {
            self.store_timeout_ms
        };
        Duration::from_millis(ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.wallet.percent <= Decimal::ZERO || self.wallet.percent > Decimal::from(100) {
            return Err(CommissionError::validation(format!(
                "wallet percent must be in (0, 100], got {}",
                self.wallet.percent
            )));
        }
        if self.receipt_retry.max_attempts == 0 {
            return Err(CommissionError::validation(
                "receipt_retry.max_attempts must be at least 1",
            ));
        }
        if self.receipt_retry.multiplier < 1.0 {
            return Err(CommissionError::validation(
                "receipt_retry.multiplier must be at least 1.0",
            ));
        }
        for driver in &self.drivers {
            if driver.commission_rate.amount() <= Decimal::ZERO {
                return Err(CommissionError::validation(format!(
                    "driver {} has a non-positive commission rate",
                    driver.id
                )));
            }
        }
        for entry in &self.rates {
            if entry.rate <= Decimal::ZERO {
                return Err(CommissionError::validation(format!(
                    "rate {} -> {} must be positive",
                    entry.from, entry.to
                )));
            }
        }
        Ok(())
    }
}
