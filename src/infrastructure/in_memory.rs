//! Process-local adapters: the default store, ledger, directory, rate
//! table, notifier and receipt issuer the server runs with when no
//! persistent backend is configured. Also the workhorses of the test
//! suites.

use crate::config::RateEntry;
use crate::domain::driver::DriverProfile;
use crate::domain::events::PayoutEvent;
use crate::domain::ids::{Country, DriverId, OrderId, PayoutId};
use crate::domain::money::{Currency, Money};
use crate::domain::order::{DeliveredOrder, PayPeriod};
use crate::domain::payout::{CommissionPayout, PayoutStatus};
use crate::domain::ports::{
    DriverDirectory, OrderLedger, PayoutNotifier, PayoutStore, RateTable, ReceiptIssuer,
    ReceiptRequest,
};
use crate::error::{CommissionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// A thread-safe in-memory payout store.
///
/// The whole map sits behind one `RwLock`, so `insert_pending` can check
/// the single-pending constraint and insert under the same write guard;
/// there is no window for a second pending row to slip in.
#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    payouts: Arc<RwLock<HashMap<PayoutId, CommissionPayout>>>,
}

impl InMemoryPayoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn insert_pending(&self, payout: CommissionPayout) -> Result<()> {
        let mut payouts = self.payouts.write().await;
        if let Some(existing) = payouts
            .values()
            .find(|p| p.driver_id == payout.driver_id && p.status == PayoutStatus::PendingApproval)
        {
            return Err(CommissionError::AlreadyPending {
                driver_id: payout.driver_id.clone(),
                existing: existing.id,
            });
        }
        payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn update(&self, payout: CommissionPayout) -> Result<()> {
        let mut payouts = self.payouts.write().await;
        if !payouts.contains_key(&payout.id) {
            return Err(CommissionError::PayoutNotFound(payout.id));
        }
        payouts.insert(payout.id, payout);
        Ok(())
    }

    async fn get(&self, id: PayoutId) -> Result<Option<CommissionPayout>> {
        let payouts = self.payouts.read().await;
        Ok(payouts.get(&id).cloned())
    }

    async fn for_driver(&self, driver_id: &DriverId) -> Result<Vec<CommissionPayout>> {
        let payouts = self.payouts.read().await;
        Ok(payouts
            .values()
            .filter(|p| &p.driver_id == driver_id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<CommissionPayout>> {
        let payouts = self.payouts.read().await;
        Ok(payouts.values().cloned().collect())
    }

    async fn pending_for_driver(&self, driver_id: &DriverId) -> Result<Option<CommissionPayout>> {
        let payouts = self.payouts.read().await;
        Ok(payouts
            .values()
            .find(|p| &p.driver_id == driver_id && p.status == PayoutStatus::PendingApproval)
            .cloned())
    }
}

/// In-memory stand-in for the external order system, seeded from a CSV
/// export at startup or from fixtures in tests.
#[derive(Default, Clone)]
pub struct InMemoryOrderLedger {
    orders: Arc<RwLock<Vec<DeliveredOrder>>>,
}

impl InMemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<DeliveredOrder>) -> Self {
        Self {
            orders: Arc::new(RwLock::new(orders)),
        }
    }

    pub async fn push(&self, order: DeliveredOrder) {
        self.orders.write().await.push(order);
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn delivered_for_driver(
        &self,
        driver_id: &DriverId,
        period: &PayPeriod,
    ) -> Result<Vec<DeliveredOrder>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|o| {
                &o.driver_id == driver_id
                    && o.shipment_status.is_delivered()
                    && period.contains(o.delivered_at)
            })
            .cloned()
            .collect())
    }

    async fn delivered_for_country(
        &self,
        country: &Country,
        period: &PayPeriod,
    ) -> Result<Vec<DeliveredOrder>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|o| {
                &o.country == country
                    && o.shipment_status.is_delivered()
                    && period.contains(o.delivered_at)
            })
            .cloned()
            .collect())
    }

    async fn delivered_history(&self, driver_id: &DriverId) -> Result<Vec<DeliveredOrder>> {
        let orders = self.orders.read().await;
        let mut rows: Vec<DeliveredOrder> = orders
            .iter()
            .filter(|o| &o.driver_id == driver_id && o.shipment_status.is_delivered())
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.delivered_at);
        Ok(rows)
    }
}

/// Driver roster, loaded from the engine config at startup.
#[derive(Default, Clone)]
pub struct InMemoryDriverDirectory {
    profiles: Arc<RwLock<HashMap<DriverId, DriverProfile>>>,
}

impl InMemoryDriverDirectory {
    pub fn new(profiles: Vec<DriverProfile>) -> Self {
        let map = profiles.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            profiles: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn insert(&self, profile: DriverProfile) {
        self.profiles.write().await.insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl DriverDirectory for InMemoryDriverDirectory {
    async fn get(&self, driver_id: &DriverId) -> Result<Option<DriverProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(driver_id).cloned())
    }

    async fn in_country(&self, country: &Country) -> Result<Vec<DriverProfile>> {
        let profiles = self.profiles.read().await;
        let mut rows: Vec<DriverProfile> = profiles
            .values()
            .filter(|p| &p.country == country)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }
}

/// Conversion table built once from config; rates only change on restart.
#[derive(Default, Clone)]
pub struct FixedRateTable {
    rates: HashMap<(Currency, Currency), Decimal>,
}

impl FixedRateTable {
    pub fn new(entries: &[RateEntry]) -> Self {
        let rates = entries
            .iter()
            .map(|e| ((e.from.clone(), e.to.clone()), e.rate))
            .collect();
        Self { rates }
    }
}

impl RateTable for FixedRateTable {
    fn rate(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        self.rates.get(&(from.clone(), to.clone())).copied()
    }
}

/// Fan-out of payout lifecycle events over a broadcast channel. Slow or
/// absent subscribers never block a state transition.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<PayoutEvent>,
}

impl BroadcastNotifier {
    const CAPACITY: usize = 1024;

    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(Self::CAPACITY);
        Self { tx }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PayoutNotifier for BroadcastNotifier {
    fn publish(&self, event: PayoutEvent) {
        // send only errs when nobody listens, which is fine
        let _ = self.tx.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<PayoutEvent> {
        self.tx.subscribe()
    }
}

/// The JSON document the file issuer renders, denormalized so the receipt
/// stays readable even if the roster or ledger move on.
#[derive(Serialize)]
struct ReceiptDocument<'a> {
    payout_id: PayoutId,
    driver_id: &'a DriverId,
    driver_name: &'a str,
    period: PayPeriod,
    status: PayoutStatus,
    total_orders: u64,
    total_earnings: &'a Money,
    commission_rate: &'a Money,
    commission_amount: &'a Money,
    payment_method: &'a str,
    orders: Vec<ReceiptLine<'a>>,
    issued_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ReceiptLine<'a> {
    order_id: &'a OrderId,
    delivered_at: DateTime<Utc>,
    total: Decimal,
    currency: &'a Currency,
}

/// Writes one immutable JSON receipt per payout under a directory.
/// The file name is derived from the payout id, so re-issuing the same
/// payout overwrites the same document instead of creating a second one.
pub struct FileReceiptIssuer {
    dir: PathBuf,
}

impl FileReceiptIssuer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ReceiptIssuer for FileReceiptIssuer {
    async fn issue(&self, request: &ReceiptRequest) -> Result<String> {
        let document = ReceiptDocument {
            payout_id: request.payout.id,
            driver_id: &request.payout.driver_id,
            driver_name: &request.driver.name,
            period: request.payout.period,
            status: request.payout.status,
            total_orders: request.payout.total_orders,
            total_earnings: &request.payout.total_earnings,
            commission_rate: &request.payout.commission_rate,
            commission_amount: &request.payout.commission_amount,
            payment_method: &request.payout.payment_method,
            orders: request
                .orders
                .iter()
                .map(|o| ReceiptLine {
                    order_id: &o.id,
                    delivered_at: o.delivered_at,
                    total: o.total,
                    currency: &o.currency,
                })
                .collect(),
            issued_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| CommissionError::Store(format!("serialize receipt: {e}")))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("receipt-{}.json", request.payout.id));
        tokio::fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().into_owned())
    }
}
