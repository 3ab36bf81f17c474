//! Shared fixtures for the integration suites: a full in-memory stack wired
//! the same way the binary wires it, plus request helpers for router tests.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use commission_engine::application::aggregation::AggregationService;
use commission_engine::application::engine::{InitiateRequest, PayoutEngine};
use commission_engine::application::receipts::{ReceiptOutbox, ReceiptWorker};
use commission_engine::application::wallet::WalletService;
use commission_engine::config::{Config, RateEntry};
use commission_engine::domain::actor::Actor;
use commission_engine::domain::driver::DriverProfile;
use commission_engine::domain::ids::{DriverId, ManagerId, OrderId, PayoutId};
use commission_engine::domain::money::{Currency, Money};
use commission_engine::domain::order::{DeliveredOrder, PayPeriod, ShipmentStatus};
use commission_engine::domain::payout::CommissionPayout;
use commission_engine::domain::ports::{PayoutStore, ReceiptIssuerArc};
use commission_engine::infrastructure::in_memory::{
    BroadcastNotifier, FileReceiptIssuer, FixedRateTable, InMemoryDriverDirectory,
    InMemoryOrderLedger, InMemoryPayoutStore,
};
use commission_engine::interfaces::http::{AppState, create_router};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DRIVER: &str = "driver-1";
pub const OTHER_DRIVER: &str = "driver-2";
pub const MANAGER: &str = "manager-1";
pub const OWNER: &str = "owner-1";

/// March 2024, the window most fixtures drop their orders into.
pub fn march() -> PayPeriod {
    PayPeriod::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

pub fn april() -> PayPeriod {
    PayPeriod::new(
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

pub fn sar(amount: Decimal) -> Money {
    Money::new(amount, Currency::new("SAR"))
}

pub fn order(id: &str, driver: &str, day: u32, total: Decimal) -> DeliveredOrder {
    DeliveredOrder {
        id: OrderId::new(id),
        driver_id: DriverId::new(driver),
        manager_id: ManagerId::new(MANAGER),
        shipment_status: ShipmentStatus::Delivered,
        delivered_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        total,
        currency: Currency::new("SAR"),
        country: "SA".into(),
    }
}

pub fn ten_orders() -> Vec<DeliveredOrder> {
    (1..=10)
        .map(|i| order(&format!("ord-{i}"), DRIVER, i, dec!(40.00)))
        .collect()
}

/// driver-1 earns 5.00 SAR per order, driver-2 earns 3.00 SAR.
pub fn default_drivers() -> Vec<DriverProfile> {
    vec![
        DriverProfile::new(DRIVER, "Ali", "SA", sar(dec!(5.00))),
        DriverProfile::new(OTHER_DRIVER, "Omar", "SA", sar(dec!(3.00))),
    ]
}

pub fn default_rates() -> Vec<RateEntry> {
    vec![
        RateEntry {
            from: Currency::new("YER"),
            to: Currency::new("SAR"),
            rate: dec!(0.015),
        },
        RateEntry {
            from: Currency::new("SAR"),
            to: Currency::new("USD"),
            rate: dec!(0.25),
        },
    ]
}

/// Everything a test might want to reach into, adapters included.
pub struct TestStack {
    pub store: Arc<InMemoryPayoutStore>,
    pub ledger: Arc<InMemoryOrderLedger>,
    pub directory: Arc<InMemoryDriverDirectory>,
    pub notifier: Arc<BroadcastNotifier>,
    pub engine: Arc<PayoutEngine>,
    pub aggregation: Arc<AggregationService>,
    pub wallets: Arc<WalletService>,
}

pub fn stack(orders: Vec<DeliveredOrder>) -> TestStack {
    wire(orders, default_drivers(), None)
}

pub fn stack_with_drivers(orders: Vec<DeliveredOrder>, drivers: Vec<DriverProfile>) -> TestStack {
    wire(orders, drivers, None)
}

/// Same stack, with the receipt worker running against `dir`. Must be
/// called from a tokio runtime.
pub fn stack_with_receipts(orders: Vec<DeliveredOrder>, dir: &Path) -> TestStack {
    wire(orders, default_drivers(), Some(dir))
}

fn wire(
    orders: Vec<DeliveredOrder>,
    drivers: Vec<DriverProfile>,
    receipts_dir: Option<&Path>,
) -> TestStack {
    let config = Config::default();
    let store = Arc::new(InMemoryPayoutStore::new());
    let ledger = Arc::new(InMemoryOrderLedger::with_orders(orders));
    let directory = Arc::new(InMemoryDriverDirectory::new(drivers));
    let rates = Arc::new(FixedRateTable::new(&default_rates()));
    let notifier = Arc::new(BroadcastNotifier::new());

    let outbox = match receipts_dir {
        Some(dir) => {
            let issuer: ReceiptIssuerArc = Arc::new(FileReceiptIssuer::new(dir));
            let worker = ReceiptWorker::new(
                store.clone(),
                ledger.clone(),
                directory.clone(),
                issuer,
                config.receipt_retry.clone(),
            );
            let (outbox, _handle) = worker.spawn();
            outbox
        }
        None => ReceiptOutbox::detached(),
    };

    let engine = Arc::new(PayoutEngine::new(
        store.clone(),
        ledger.clone(),
        directory.clone(),
        notifier.clone(),
        outbox,
        &config,
    ));
    let aggregation = Arc::new(AggregationService::new(
        store.clone(),
        ledger.clone(),
        directory.clone(),
        rates.clone(),
        config.store_timeout(),
        config.receipt_retry.clone(),
    ));
    let wallets = Arc::new(WalletService::new(
        ledger.clone(),
        directory.clone(),
        rates,
        config.wallet.clone(),
        config.receipt_retry,
    ));

    TestStack {
        store,
        ledger,
        directory,
        notifier,
        engine,
        aggregation,
        wallets,
    }
}

pub fn router(stack: &TestStack) -> Router {
    create_router(Arc::new(AppState {
        engine: stack.engine.clone(),
        aggregation: stack.aggregation.clone(),
        wallets: stack.wallets.clone(),
        notifier: stack.notifier.clone(),
    }))
}

pub fn initiate_request(driver: &str) -> InitiateRequest {
    InitiateRequest {
        driver_id: DriverId::new(driver),
        period: march(),
        payment_method: "bank_transfer".to_string(),
        note: None,
    }
}

/// Opens the standard pending payout: driver-1 over March, by manager-1.
pub async fn pending_payout(stack: &TestStack) -> CommissionPayout {
    stack
        .engine
        .initiate(&Actor::manager(MANAGER), initiate_request(DRIVER))
        .await
        .unwrap()
}

/// Polls until the receipt worker has recorded a path for the payout.
pub async fn wait_for_receipt(
    store: &Arc<InMemoryPayoutStore>,
    payout_id: PayoutId,
) -> Option<String> {
    for _ in 0..200 {
        if let Some(payout) = store.get(payout_id).await.unwrap()
            && payout.receipt_path.is_some()
        {
            return payout.receipt_path;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

pub fn get_as(uri: &str, actor_id: &str, role: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-actor-id", actor_id)
        .header("x-actor-role", role)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json_as(
    uri: &str,
    actor_id: &str,
    role: &str,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-actor-id", actor_id)
        .header("x-actor-role", role)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
