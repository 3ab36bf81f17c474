use crate::application::retry::retry_with_backoff;
use crate::config::{RetryConfig, WalletConfig};
use crate::domain::ids::DriverId;
use crate::domain::money::Money;
use crate::domain::ports::{DriverDirectoryArc, OrderLedgerArc, RateTableArc};
use crate::error::{CommissionError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Informational wallet balance shown in the driver app. Purely derived
/// from delivered orders; approving or settling payouts never moves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub driver_id: DriverId,
    /// Earned commission in the fixed reporting currency.
    pub primary: Money,
    /// The same figure in the secondary display currency.
    pub secondary: Money,
    /// Set when any conversion on the way here missed the rate table.
    pub estimated: bool,
}

/// Computes the wallet figure: a configured percentage of the driver's
/// all-time delivered totals, converted order currency to primary, then
/// primary to secondary. Both conversions degrade to face value on a rate
/// miss instead of hiding the wallet.
pub struct WalletService {
    ledger: OrderLedgerArc,
    directory: DriverDirectoryArc,
    rates: RateTableArc,
    config: WalletConfig,
    retry: RetryConfig,
}

impl WalletService {
    pub fn new(
        ledger: OrderLedgerArc,
        directory: DriverDirectoryArc,
        rates: RateTableArc,
        config: WalletConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            ledger,
            directory,
            rates,
            config,
            retry,
        }
    }

    pub async fn wallet(&self, driver_id: &DriverId) -> Result<WalletSnapshot> {
        if self.directory.get(driver_id).await?.is_none() {
            return Err(CommissionError::DriverNotFound(driver_id.clone()));
        }

        let history = {
            let ledger = self.ledger.clone();
            let driver_id = driver_id.clone();
            retry_with_backoff(&self.retry, move |_| {
                let ledger = ledger.clone();
                let driver_id = driver_id.clone();
                async move { ledger.delivered_history(&driver_id).await }
            })
            .await?
        };

        let mut estimated = false;
        let mut total = Money::zero(self.config.primary_currency.clone());
        for order in &history {
            if !order.shipment_status.is_delivered() {
                continue;
            }
            let converted = self
                .rates
                .convert(&order.total_money(), &self.config.primary_currency);
            estimated |= converted.estimated;
            total = total.checked_add(&converted.money)?;
        }

        let primary = total.scaled(self.config.percent / Decimal::ONE_HUNDRED);
        let secondary = self
            .rates
            .convert(&primary, &self.config.secondary_currency);

        Ok(WalletSnapshot {
            driver_id: driver_id.clone(),
            primary,
            secondary: secondary.money,
            estimated: estimated || secondary.estimated,
        })
    }
}
