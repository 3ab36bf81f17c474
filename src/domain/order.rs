use crate::domain::ids::{Country, DriverId, ManagerId, OrderId};
use crate::domain::money::{Currency, Money};
use crate::error::{CommissionError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shipment lifecycle as reported by the external order system. Only
/// `delivered` rows earn commission anywhere in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
    Returned,
}

impl ShipmentStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Read-only view of one order row in the external ledger.
///
/// `total` and `currency` stay separate columns rather than a nested
/// [`Money`] so the row deserializes straight out of a CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredOrder {
    pub id: OrderId,
    pub driver_id: DriverId,
    pub manager_id: ManagerId,
    pub shipment_status: ShipmentStatus,
    pub delivered_at: DateTime<Utc>,
    pub total: Decimal,
    pub currency: Currency,
    pub country: Country,
}

impl DeliveredOrder {
    pub fn total_money(&self) -> Money {
        Money::new(self.total, self.currency.clone())
    }
}

/// Half-open time window `[from, to)` a payout or dashboard query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl PayPeriod {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if from > to {
            return Err(CommissionError::validation(format!(
                "invalid period: {from} is after {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Builds the window from calendar dates the way dashboard queries send
    /// them: `to` is inclusive as a date, so the window ends at midnight of
    /// the following day.
    pub fn from_dates(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        let start = from
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CommissionError::validation("invalid from date"))?
            .and_utc();
        let end = to
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .ok_or_else(|| CommissionError::validation("invalid to date"))?
            .and_utc();
        Self::new(start, end)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }

    pub fn overlaps(&self, other: &PayPeriod) -> bool {
        self.from < other.to && other.from < self.to
    }
}
