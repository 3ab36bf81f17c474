use crate::application::retry::retry_with_backoff;
use crate::config::RetryConfig;
use crate::domain::driver::DriverProfile;
use crate::domain::ids::{Country, DriverId, PayoutId};
use crate::domain::money::{Currency, Money};
use crate::domain::order::{DeliveredOrder, PayPeriod};
use crate::domain::payout::PayoutStatus;
use crate::domain::ports::{DriverDirectoryArc, OrderLedgerArc, PayoutStoreArc, RateTableArc};
use crate::error::{CommissionError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// One dashboard line: everything a manager needs to decide whether to
/// initiate a payout for this driver, in the driver's operating currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRow {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub currency: Currency,
    pub total_orders: u64,
    pub total_earnings: Money,
    pub commission_owed: Money,
    pub commission_paid: Money,
    pub commission_pending: Money,
    pub pending_payout: Option<PayoutId>,
    /// At least one amount in this row went through a missing conversion
    /// rate and was taken at face value.
    pub estimated: bool,
}

/// Read model behind the manager dashboard.
///
/// A single pass per request: one country-wide ledger read (retried with
/// backoff), then per-driver payout sums. Window totals count every
/// delivered order in the period; what a new payout would actually claim is
/// decided by the engine, which additionally excludes bound orders.
pub struct AggregationService {
    store: PayoutStoreArc,
    ledger: OrderLedgerArc,
    directory: DriverDirectoryArc,
    rates: RateTableArc,
    store_timeout: Duration,
    retry: RetryConfig,
}

impl AggregationService {
    pub fn new(
        store: PayoutStoreArc,
        ledger: OrderLedgerArc,
        directory: DriverDirectoryArc,
        rates: RateTableArc,
        store_timeout: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            directory,
            rates,
            store_timeout,
            retry,
        }
    }

    /// One row per driver of the country with activity in the window. No
    /// country, or a country without drivers, is an empty dashboard rather
    /// than an error.
    pub async fn dashboard(
        &self,
        country: Option<&Country>,
        period: PayPeriod,
    ) -> Result<Vec<DashboardRow>> {
        let Some(country) = country else {
            return Ok(Vec::new());
        };

        let drivers = self.directory.in_country(country).await?;
        if drivers.is_empty() {
            return Ok(Vec::new());
        }

        let delivered = {
            let ledger = self.ledger.clone();
            let country = country.clone();
            retry_with_backoff(&self.retry, move |_| {
                let ledger = ledger.clone();
                let country = country.clone();
                async move { ledger.delivered_for_country(&country, &period).await }
            })
            .await?
        };

        let mut by_driver: HashMap<DriverId, Vec<DeliveredOrder>> = HashMap::new();
        for order in delivered {
            if order.shipment_status.is_delivered() {
                by_driver
                    .entry(order.driver_id.clone())
                    .or_default()
                    .push(order);
            }
        }

        let mut rows = Vec::new();
        for profile in &drivers {
            let orders = by_driver.remove(&profile.id).unwrap_or_default();
            if let Some(row) = self.row_for(profile, orders, period).await? {
                rows.push(row);
            }
        }
        rows.sort_by(|a, b| a.driver_id.cmp(&b.driver_id));
        Ok(rows)
    }

    async fn row_for(
        &self,
        profile: &DriverProfile,
        orders: Vec<DeliveredOrder>,
        period: PayPeriod,
    ) -> Result<Option<DashboardRow>> {
        let currency = profile.currency.clone();
        let mut estimated = false;

        let mut total_earnings = Money::zero(currency.clone());
        for order in &orders {
            let converted = self.into_currency(&order.total_money(), &currency, &mut estimated);
            total_earnings = total_earnings.checked_add(&converted)?;
        }
        let total_orders = orders.len() as u64;
        let commission_owed = profile.commission_rate.scaled(Decimal::from(total_orders));

        let payouts = self.store_call(self.store.for_driver(&profile.id)).await?;
        let mut commission_paid = Money::zero(currency.clone());
        let mut commission_pending = Money::zero(currency.clone());
        let mut pending_payout = None;
        for payout in &payouts {
            match payout.status {
                // Settled history only counts when it touches the window,
                // otherwise last month's payout would shadow this month's.
                PayoutStatus::Approved | PayoutStatus::Paid
                    if period.overlaps(&payout.period) =>
                {
                    let converted =
                        self.into_currency(&payout.commission_amount, &currency, &mut estimated);
                    commission_paid = commission_paid.checked_add(&converted)?;
                }
                // The open payout always shows: it blocks initiation no
                // matter which window it was drawn over.
                PayoutStatus::PendingApproval => {
                    let converted =
                        self.into_currency(&payout.commission_amount, &currency, &mut estimated);
                    commission_pending = commission_pending.checked_add(&converted)?;
                    pending_payout = Some(payout.id);
                }
                _ => {}
            }
        }

        let active = total_orders > 0
            || !commission_paid.is_zero()
            || pending_payout.is_some();
        if !active {
            return Ok(None);
        }

        Ok(Some(DashboardRow {
            driver_id: profile.id.clone(),
            driver_name: profile.name.clone(),
            currency,
            total_orders,
            total_earnings,
            commission_owed,
            commission_paid,
            commission_pending,
            pending_payout,
            estimated,
        }))
    }

    fn into_currency(&self, money: &Money, to: &Currency, estimated: &mut bool) -> Money {
        let converted = self.rates.convert(money, to);
        *estimated |= converted.estimated;
        converted.money
    }

    async fn store_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CommissionError::store_timeout(
                "payout store",
                self.store_timeout,
            )),
        }
    }
}
