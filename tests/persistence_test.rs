//! Engine behavior over the RocksDB store across process-style restarts.
//! Each reopen simulates a crash by dropping every handle first.

#![cfg(feature = "storage-rocksdb")]

mod common;

use common::*;
use commission_engine::application::engine::{HistoryFilter, PayoutEngine};
use commission_engine::application::receipts::ReceiptOutbox;
use commission_engine::config::Config;
use commission_engine::domain::actor::Actor;
use commission_engine::domain::payout::PayoutStatus;
use commission_engine::error::CommissionError;
use commission_engine::infrastructure::in_memory::{
    BroadcastNotifier, InMemoryDriverDirectory, InMemoryOrderLedger,
};
use commission_engine::infrastructure::rocksdb::RocksDbPayoutStore;
use std::path::Path;
use std::sync::Arc;

fn engine_on(db_path: &Path) -> PayoutEngine {
    let store = RocksDbPayoutStore::open(db_path).unwrap();
    PayoutEngine::new(
        Arc::new(store),
        Arc::new(InMemoryOrderLedger::with_orders(ten_orders())),
        Arc::new(InMemoryDriverDirectory::new(default_drivers())),
        Arc::new(BroadcastNotifier::new()),
        ReceiptOutbox::detached(),
        &Config::default(),
    )
}

#[tokio::test]
async fn payout_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("payouts");

    let id = {
        let engine = engine_on(&db_path);
        let payout = engine
            .initiate(&Actor::manager(MANAGER), initiate_request(DRIVER))
            .await
            .unwrap();
        engine
            .approve(&Actor::driver(DRIVER), payout.id, Some("ok".into()))
            .await
            .unwrap();
        payout.id
    };

    let engine = engine_on(&db_path);
    let restored = engine.get(&Actor::owner(OWNER), id).await.unwrap();
    assert_eq!(restored.status, PayoutStatus::Approved);
    assert_eq!(restored.total_orders, 10);
    assert_eq!(restored.driver_note.as_deref(), Some("ok"));
}

#[tokio::test]
async fn the_single_pending_rule_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("payouts");

    let first_id = {
        let engine = engine_on(&db_path);
        engine
            .initiate(&Actor::manager(MANAGER), initiate_request(DRIVER))
            .await
            .unwrap()
            .id
    };

    let engine = engine_on(&db_path);
    let err = engine
        .initiate(&Actor::manager(MANAGER), initiate_request(DRIVER))
        .await
        .unwrap_err();
    match err {
        CommissionError::AlreadyPending { existing, .. } => assert_eq!(existing, first_id),
        other => panic!("expected AlreadyPending, got {other}"),
    }
}

#[tokio::test]
async fn a_rejection_after_restart_frees_the_driver() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("payouts");

    let first_id = {
        let engine = engine_on(&db_path);
        engine
            .initiate(&Actor::manager(MANAGER), initiate_request(DRIVER))
            .await
            .unwrap()
            .id
    };

    let second_id = {
        let engine = engine_on(&db_path);
        engine
            .reject(&Actor::driver(DRIVER), first_id, "recount".into())
            .await
            .unwrap();
        engine
            .initiate(&Actor::manager(MANAGER), initiate_request(DRIVER))
            .await
            .unwrap()
            .id
    };
    assert_ne!(second_id, first_id);

    let engine = engine_on(&db_path);
    let history = engine
        .history(&Actor::owner(OWNER), HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    let statuses: Vec<_> = history.iter().map(|p| p.status).collect();
    assert!(statuses.contains(&PayoutStatus::Rejected));
    assert!(statuses.contains(&PayoutStatus::PendingApproval));
}
