//! Receipt generation, decoupled from the approval that triggers it.
//!
//! Approval commits first and only then drops a job on the outbox; the
//! worker issues the document with bounded backoff. A receipt that cannot
//! be produced leaves `receipt_path` null and an error in the log, never a
//! rolled-back approval.

use crate::application::retry::retry_with_backoff;
use crate::config::RetryConfig;
use crate::domain::ids::PayoutId;
use crate::domain::payout::PayoutStatus;
use crate::domain::ports::{
    DriverDirectoryArc, OrderLedgerArc, PayoutStoreArc, ReceiptIssuerArc, ReceiptRequest,
};
use crate::error::{CommissionError, Result};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const OUTBOX_CAPACITY: usize = 256;

/// Sending half of the receipt outbox. Enqueueing never blocks and never
/// fails the caller; a missing or saturated worker is only logged.
#[derive(Clone)]
pub struct ReceiptOutbox {
    tx: mpsc::Sender<PayoutId>,
}

impl ReceiptOutbox {
    /// An outbox with no worker behind it; every job is quietly dropped.
    /// Used when the server runs without receipt generation and in tests.
    pub fn detached() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self { tx }
    }

    pub fn enqueue(&self, payout_id: PayoutId) {
        match self.tx.try_send(payout_id) {
            Ok(()) => {}
            Err(TrySendError::Full(id)) => {
                warn!(payout_id = %id, "receipt outbox full, dropping job");
            }
            Err(TrySendError::Closed(id)) => {
                debug!(payout_id = %id, "no receipt worker running");
            }
        }
    }
}

/// Consumes the outbox and issues one receipt per approved payout.
pub struct ReceiptWorker {
    store: PayoutStoreArc,
    ledger: OrderLedgerArc,
    directory: DriverDirectoryArc,
    issuer: ReceiptIssuerArc,
    retry: RetryConfig,
}

impl ReceiptWorker {
    pub fn new(
        store: PayoutStoreArc,
        ledger: OrderLedgerArc,
        directory: DriverDirectoryArc,
        issuer: ReceiptIssuerArc,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            directory,
            issuer,
            retry,
        }
    }

    /// Starts the worker task and hands back the outbox feeding it. The
    /// task ends when every outbox handle has been dropped.
    pub fn spawn(self) -> (ReceiptOutbox, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let handle = tokio::spawn(async move {
            while let Some(payout_id) = rx.recv().await {
                if let Err(err) = self.issue_one(payout_id).await {
                    error!(payout_id = %payout_id, error = %err, "receipt issuance failed");
                }
            }
            debug!("receipt outbox closed, worker stopping");
        });
        (ReceiptOutbox { tx }, handle)
    }

    async fn issue_one(&self, payout_id: PayoutId) -> Result<()> {
        let Some(mut payout) = self.store.get(payout_id).await? else {
            warn!(payout_id = %payout_id, "receipt job for unknown payout");
            return Ok(());
        };
        if payout.receipt_path.is_some() {
            debug!(payout_id = %payout_id, "receipt already issued");
            return Ok(());
        }
        debug_assert!(matches!(
            payout.status,
            PayoutStatus::Approved | PayoutStatus::Paid
        ));

        let driver = self
            .directory
            .get(&payout.driver_id)
            .await?
            .ok_or_else(|| CommissionError::DriverNotFound(payout.driver_id.clone()))?;

        let period = payout.period;
        let orders = {
            let ledger = self.ledger.clone();
            let driver_id = payout.driver_id.clone();
            retry_with_backoff(&self.retry, move |_| {
                let ledger = ledger.clone();
                let driver_id = driver_id.clone();
                async move { ledger.delivered_for_driver(&driver_id, &period).await }
            })
            .await?
        };
        let covered = orders
            .into_iter()
            .filter(|order| payout.order_ids.contains(&order.id))
            .collect();

        let request = ReceiptRequest {
            payout: payout.clone(),
            driver,
            orders: covered,
        };
        let path = {
            let issuer = self.issuer.clone();
            retry_with_backoff(&self.retry, move |_| {
                let issuer = issuer.clone();
                let request = request.clone();
                async move { issuer.issue(&request).await }
            })
            .await?
        };

        payout.receipt_path = Some(path.clone());
        self.store.update(payout).await?;
        info!(payout_id = %payout_id, path = %path, "receipt issued");
        Ok(())
    }
}
