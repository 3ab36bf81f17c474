//! Trait seams between the payout core and its collaborators.
//!
//! The order ledger, driver directory, rate table and receipt issuer are
//! owned by other systems; the payout store and notifier are ours but stay
//! behind traits so tests and the optional RocksDB backend slot in without
//! touching the engine.

use crate::domain::driver::DriverProfile;
use crate::domain::events::PayoutEvent;
use crate::domain::ids::{Country, DriverId, PayoutId};
use crate::domain::money::{Currency, Money};
use crate::domain::order::{DeliveredOrder, PayPeriod};
use crate::domain::payout::CommissionPayout;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Persistence for payout records.
///
/// `insert_pending` is the unique-constraint half of the single-pending
/// invariant: it must atomically refuse a second `pending_approval` row for
/// the same driver and report the existing payout id in the error, so even
/// a caller that bypasses the engine's per-driver lock cannot double-book.
#[async_trait]
pub trait PayoutStore: Send + Sync {
    async fn insert_pending(&self, payout: CommissionPayout) -> Result<()>;
    async fn update(&self, payout: CommissionPayout) -> Result<()>;
    async fn get(&self, id: PayoutId) -> Result<Option<CommissionPayout>>;
    async fn for_driver(&self, driver_id: &DriverId) -> Result<Vec<CommissionPayout>>;
    async fn all(&self) -> Result<Vec<CommissionPayout>>;
    async fn pending_for_driver(&self, driver_id: &DriverId) -> Result<Option<CommissionPayout>>;
}

/// Read-only window onto the external order system. Implementations must
/// only ever return rows with `shipment_status == delivered`.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn delivered_for_driver(
        &self,
        driver_id: &DriverId,
        period: &PayPeriod,
    ) -> Result<Vec<DeliveredOrder>>;

    async fn delivered_for_country(
        &self,
        country: &Country,
        period: &PayPeriod,
    ) -> Result<Vec<DeliveredOrder>>;

    /// Unbounded history for one driver, oldest first; feeds the wallet's
    /// running total.
    async fn delivered_history(&self, driver_id: &DriverId) -> Result<Vec<DeliveredOrder>>;
}

/// Roster of drivers and their configured commission rates.
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn get(&self, driver_id: &DriverId) -> Result<Option<DriverProfile>>;
    async fn in_country(&self, country: &Country) -> Result<Vec<DriverProfile>>;
}

/// Pure lookup over the externally maintained conversion table.
pub trait RateTable: Send + Sync {
    /// Multiplier taking an amount in `from` to `to`, if the table has one.
    fn rate(&self, from: &Currency, to: &Currency) -> Option<Decimal>;

    /// Converts through the table. A missing rate does not fail the read
    /// path: the amount is taken at face value in the target currency and
    /// the result is flagged so callers can mark the row as estimated.
    fn convert(&self, money: &Money, to: &Currency) -> Converted {
        if money.currency() == to {
            return Converted {
                money: money.clone(),
                estimated: false,
            };
        }
        match self.rate(money.currency(), to) {
            Some(rate) => Converted {
                money: Money::new(money.amount() * rate, to.clone()),
                estimated: false,
            },
            None => {
                warn!(
                    from = %money.currency(),
                    to = %to,
                    "no conversion rate, amount taken at face value"
                );
                Converted {
                    money: Money::new(money.amount(), to.clone()),
                    estimated: true,
                }
            }
        }
    }
}

/// Result of a rate-table conversion; `estimated` marks a lookup miss.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub money: Money,
    pub estimated: bool,
}

/// Everything the receipt issuer needs to render one immutable document.
#[derive(Debug, Clone)]
pub struct ReceiptRequest {
    pub payout: CommissionPayout,
    pub driver: DriverProfile,
    pub orders: Vec<DeliveredOrder>,
}

/// Produces the immutable payout document and returns its storage path.
///
/// Must be idempotent per payout id: re-issuing overwrites or is a no-op,
/// never a duplicate.
#[async_trait]
pub trait ReceiptIssuer: Send + Sync {
    async fn issue(&self, request: &ReceiptRequest) -> Result<String>;
}

/// Best-effort fan-out of lifecycle events to dashboard subscribers.
/// Publishing to nobody is not an error; dashboards re-poll as a fallback.
pub trait PayoutNotifier: Send + Sync {
    fn publish(&self, event: PayoutEvent);
    fn subscribe(&self) -> broadcast::Receiver<PayoutEvent>;
}

pub type PayoutStoreArc = Arc<dyn PayoutStore>;
pub type OrderLedgerArc = Arc<dyn OrderLedger>;
pub type DriverDirectoryArc = Arc<dyn DriverDirectory>;
pub type RateTableArc = Arc<dyn RateTable>;
pub type ReceiptIssuerArc = Arc<dyn ReceiptIssuer>;
pub type PayoutNotifierArc = Arc<dyn PayoutNotifier>;
