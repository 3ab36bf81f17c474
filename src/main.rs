use clap::Parser;
use commission_engine::application::aggregation::AggregationService;
use commission_engine::application::engine::PayoutEngine;
use commission_engine::application::receipts::{ReceiptOutbox, ReceiptWorker};
use commission_engine::application::wallet::WalletService;
use commission_engine::config::Config;
use commission_engine::domain::order::DeliveredOrder;
use commission_engine::domain::ports::{PayoutStoreArc, ReceiptIssuerArc};
use commission_engine::infrastructure::in_memory::{
    BroadcastNotifier, FileReceiptIssuer, FixedRateTable, InMemoryDriverDirectory,
    InMemoryOrderLedger, InMemoryPayoutStore,
};
use commission_engine::interfaces::csv::order_reader::OrderReader;
use commission_engine::interfaces::http::{AppState, create_router};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to serve the commission API on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Delivered-orders CSV seeding the order ledger
    #[arg(long)]
    orders: Option<PathBuf>,

    /// Directory receipt documents are written into; omit to disable receipts
    #[arg(long)]
    receipts_dir: Option<PathBuf>,

    /// Path to persistent payout database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path).into_diagnostic()?,
        None => Config::default(),
    };

    let store = payout_store(&cli).into_diagnostic()?;
    let ledger = Arc::new(InMemoryOrderLedger::with_orders(
        read_orders(cli.orders.as_deref()).into_diagnostic()?,
    ));
    let directory = Arc::new(InMemoryDriverDirectory::new(config.drivers.clone()));
    let rates = Arc::new(FixedRateTable::new(&config.rates));
    let notifier = Arc::new(BroadcastNotifier::new());

    let (outbox, _receipt_worker) = match &cli.receipts_dir {
        Some(dir) => {
            let issuer: ReceiptIssuerArc = Arc::new(FileReceiptIssuer::new(dir.clone()));
            let worker = ReceiptWorker::new(
                store.clone(),
                ledger.clone(),
                directory.clone(),
                issuer,
                config.receipt_retry.clone(),
            );
            let (outbox, handle) = worker.spawn();
            (outbox, Some(handle))
        }
        None => {
            info!("no receipts dir given, receipt generation disabled");
            (ReceiptOutbox::detached(), None)
        }
    };

    let engine = PayoutEngine::new(
        store.clone(),
        ledger.clone(),
        directory.clone(),
        notifier.clone(),
        outbox,
        &config,
    );
    let aggregation = AggregationService::new(
        store,
        ledger.clone(),
        directory.clone(),
        rates.clone(),
        config.store_timeout(),
        config.receipt_retry.clone(),
    );
    let wallets = WalletService::new(
        ledger,
        directory,
        rates,
        config.wallet.clone(),
        config.receipt_retry,
    );

    let state = Arc::new(AppState {
        engine: Arc::new(engine),
        aggregation: Arc::new(aggregation),
        wallets: Arc::new(wallets),
        notifier,
    });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .into_diagnostic()?;
    info!(listen = %cli.listen, "commission engine listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    Ok(())
}

/// Reads the seed CSV, skipping malformed rows the way a nightly import
/// would rather than refusing the whole file.
fn read_orders(path: Option<&Path>) -> commission_engine::error::Result<Vec<DeliveredOrder>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let file = File::open(path)?;
    let mut orders = Vec::new();
    for row in OrderReader::new(file).orders() {
        match row {
            Ok(order) => orders.push(order),
            Err(e) => warn!(error = %e, "skipping malformed order row"),
        }
    }
    info!(count = orders.len(), path = %path.display(), "order ledger seeded");
    Ok(orders)
}

#[cfg(feature = "storage-rocksdb")]
fn payout_store(cli: &Cli) -> commission_engine::error::Result<PayoutStoreArc> {
    use commission_engine::infrastructure::rocksdb::RocksDbPayoutStore;
    Ok(match &cli.db_path {
        Some(path) => Arc::new(RocksDbPayoutStore::open(path)?),
        None => Arc::new(InMemoryPayoutStore::new()),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn payout_store(_cli: &Cli) -> commission_engine::error::Result<PayoutStoreArc> {
    Ok(Arc::new(InMemoryPayoutStore::new()))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
