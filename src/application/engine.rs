use crate::application::receipts::ReceiptOutbox;
use crate::application::retry::retry_with_backoff;
use crate::config::{Config, RetryConfig};
use crate::domain::actor::{Actor, Role};
use crate::domain::events::{PayoutEvent, PayoutTopic};
use crate::domain::ids::{DriverId, ManagerId, PayoutId};
use crate::domain::money::Money;
use crate::domain::order::{DeliveredOrder, PayPeriod};
use crate::domain::payout::{CommissionPayout, PayoutStatus};
use crate::domain::ports::{
    DriverDirectoryArc, OrderLedgerArc, PayoutNotifierArc, PayoutStoreArc,
};
use crate::error::{CommissionError, Result};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// One async mutex per driver. Every state-machine operation runs under the
/// lock of the payout's driver, so two operations on the same driver can
/// never interleave between their read and their write.
#[derive(Default)]
struct DriverLocks {
    inner: Mutex<HashMap<DriverId, Arc<Mutex<()>>>>,
}

impl DriverLocks {
    async fn acquire(&self, driver_id: &DriverId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry(driver_id.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

/// Parameters of an `Initiate` call, as they arrive from the interface layer.
/// The period is already a validated [`PayPeriod`].
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub driver_id: DriverId,
    pub period: PayPeriod,
    pub payment_method: String,
    pub note: Option<String>,
}

/// Optional narrowing of the history listing. Drivers are always scoped to
/// their own rows regardless of what the filter asks for.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub driver_id: Option<DriverId>,
    pub status: Option<PayoutStatus>,
}

/// The entry point for every commission payout operation.
///
/// `PayoutEngine` owns the port handles and enforces the rules the record
/// types cannot see on their own: one pending payout per driver, no
/// double-claiming of orders, and role checks on every transition. Writes to
/// the payout store go through a per-driver lock plus a configured timeout;
/// a timeout surfaces as a retryable error and leaves no partial state.
pub struct PayoutEngine {
    store: PayoutStoreArc,
    ledger: OrderLedgerArc,
    directory: DriverDirectoryArc,
    notifier: PayoutNotifierArc,
    outbox: ReceiptOutbox,
    locks: DriverLocks,
    store_timeout: Duration,
    retry: RetryConfig,
}

impl PayoutEngine {
    pub fn new(
        store: PayoutStoreArc,
        ledger: OrderLedgerArc,
        directory: DriverDirectoryArc,
        notifier: PayoutNotifierArc,
        outbox: ReceiptOutbox,
        config: &Config,
    ) -> Self {
        Self {
            store,
            ledger,
            directory,
            notifier,
            outbox,
            locks: DriverLocks::default(),
            store_timeout: config.store_timeout(),
            retry: config.receipt_retry.clone(),
        }
    }

    /// Opens a payout for every unbound delivered order of the driver in the
    /// period. The new record starts in `pending_approval` with its orders
    /// bound and `commission_amount = order count x per-order rate`.
    pub async fn initiate(
        &self,
        actor: &Actor,
        request: InitiateRequest,
    ) -> Result<CommissionPayout> {
        if !actor.can_initiate() {
            return Err(CommissionError::Forbidden {
                role: actor.role,
                action: "initiate a payout",
            });
        }
        if request.payment_method.trim().is_empty() {
            return Err(CommissionError::validation("payment_method must not be empty"));
        }

        let _guard = self.locks.acquire(&request.driver_id).await;

        // The single-pending check comes before eligibility so a concurrent
        // duplicate reports the conflicting payout, not an empty window.
        if let Some(existing) = self
            .store_call(self.store.pending_for_driver(&request.driver_id))
            .await?
        {
            return Err(CommissionError::AlreadyPending {
                driver_id: request.driver_id,
                existing: existing.id,
            });
        }

        let driver = self
            .directory
            .get(&request.driver_id)
            .await?
            .ok_or_else(|| CommissionError::DriverNotFound(request.driver_id.clone()))?;

        let eligible = self.eligible_orders(&request.driver_id, request.period).await?;
        if eligible.is_empty() {
            return Err(CommissionError::NothingToPay(request.driver_id));
        }

        let mut total_earnings = Money::zero(driver.currency.clone());
        let mut order_ids = BTreeSet::new();
        for order in &eligible {
            total_earnings = total_earnings.checked_add(&order.total_money())?;
            order_ids.insert(order.id.clone());
        }

        let owner_id = (actor.role == Role::Owner).then(|| actor.id.clone());
        let payout = CommissionPayout::initiate(
            request.driver_id,
            ManagerId::new(actor.id.clone()),
            owner_id,
            request.period,
            order_ids,
            total_earnings,
            driver.commission_rate.clone(),
            request.payment_method,
            request.note,
        );

        self.store_call(self.store.insert_pending(payout.clone()))
            .await?;

        info!(
            payout_id = %payout.id,
            driver_id = %payout.driver_id,
            orders = payout.total_orders,
            amount = %payout.commission_amount,
            "payout initiated"
        );
        self.notifier
            .publish(PayoutEvent::of(PayoutTopic::PendingApproval, &payout));
        Ok(payout)
    }

    /// Driver acknowledgment. Commits the transition first; the receipt is
    /// generated afterwards by the outbox worker and can never roll the
    /// approval back.
    pub async fn approve(
        &self,
        actor: &Actor,
        payout_id: PayoutId,
        note: Option<String>,
    ) -> Result<CommissionPayout> {
        let driver_id = self.load(payout_id).await?.driver_id;
        let _guard = self.locks.acquire(&driver_id).await;

        let mut payout = self.load(payout_id).await?;
        if actor.role != Role::Driver {
            return Err(CommissionError::Forbidden {
                role: actor.role,
                action: "approve a payout",
            });
        }
        if !actor.can_approve(&payout) {
            return Err(CommissionError::ActorMismatch {
                payout_id,
                actor: actor.id.clone(),
            });
        }

        payout.approve(actor.id.as_str(), note)?;
        self.store_call(self.store.update(payout.clone())).await?;

        info!(payout_id = %payout.id, driver_id = %payout.driver_id, "payout approved");
        self.notifier
            .publish(PayoutEvent::of(PayoutTopic::Approved, &payout));
        self.outbox.enqueue(payout.id);
        Ok(payout)
    }

    /// Driver refusal with a mandatory reason. Releases the bound orders for
    /// a future, presumably corrected, payout.
    pub async fn reject(
        &self,
        actor: &Actor,
        payout_id: PayoutId,
        reason: String,
    ) -> Result<CommissionPayout> {
        if reason.trim().is_empty() {
            return Err(CommissionError::validation("a rejection reason is required"));
        }

        let driver_id = self.load(payout_id).await?.driver_id;
        let _guard = self.locks.acquire(&driver_id).await;

        let mut payout = self.load(payout_id).await?;
        if actor.role != Role::Driver {
            return Err(CommissionError::Forbidden {
                role: actor.role,
                action: "reject a payout",
            });
        }
        if !actor.can_reject(&payout) {
            return Err(CommissionError::ActorMismatch {
                payout_id,
                actor: actor.id.clone(),
            });
        }

        payout.reject(actor.id.as_str(), reason)?;
        self.store_call(self.store.update(payout.clone())).await?;

        info!(payout_id = %payout.id, driver_id = %payout.driver_id, "payout rejected");
        self.notifier
            .publish(PayoutEvent::of(PayoutTopic::Rejected, &payout));
        Ok(payout)
    }

    /// Business-side withdrawal before the driver acts: the initiating
    /// manager, or the owner on their behalf.
    pub async fn cancel(&self, actor: &Actor, payout_id: PayoutId) -> Result<CommissionPayout> {
        let driver_id = self.load(payout_id).await?.driver_id;
        let _guard = self.locks.acquire(&driver_id).await;

        let mut payout = self.load(payout_id).await?;
        if actor.role == Role::Driver {
            return Err(CommissionError::Forbidden {
                role: actor.role,
                action: "cancel a payout",
            });
        }
        if !actor.can_cancel(&payout) {
            return Err(CommissionError::ActorMismatch {
                payout_id,
                actor: actor.id.clone(),
            });
        }

        payout.cancel(actor.id.as_str())?;
        self.store_call(self.store.update(payout.clone())).await?;

        info!(payout_id = %payout.id, driver_id = %payout.driver_id, "payout cancelled");
        self.notifier
            .publish(PayoutEvent::of(PayoutTopic::Cancelled, &payout));
        Ok(payout)
    }

    /// Optional settlement confirmation once the money has actually moved.
    pub async fn mark_paid(
        &self,
        actor: &Actor,
        payout_id: PayoutId,
        payment_reference: String,
    ) -> Result<CommissionPayout> {
        if payment_reference.trim().is_empty() {
            return Err(CommissionError::validation("a payment reference is required"));
        }

        let driver_id = self.load(payout_id).await?.driver_id;
        let _guard = self.locks.acquire(&driver_id).await;

        let mut payout = self.load(payout_id).await?;
        if !actor.can_mark_paid() {
            return Err(CommissionError::Forbidden {
                role: actor.role,
                action: "confirm settlement",
            });
        }

        payout.mark_paid(actor.id.as_str(), payment_reference)?;
        self.store_call(self.store.update(payout.clone())).await?;

        info!(payout_id = %payout.id, driver_id = %payout.driver_id, "payout settled");
        self.notifier
            .publish(PayoutEvent::of(PayoutTopic::Paid, &payout));
        Ok(payout)
    }

    /// Single payout, scoped by visibility: a driver asking about someone
    /// else's payout learns nothing, not even that it exists.
    pub async fn get(&self, actor: &Actor, payout_id: PayoutId) -> Result<CommissionPayout> {
        let payout = self.load(payout_id).await?;
        if !actor.can_view(&payout) {
            return Err(CommissionError::PayoutNotFound(payout_id));
        }
        Ok(payout)
    }

    /// All payouts of the calling driver, newest first.
    pub async fn my_payouts(&self, actor: &Actor) -> Result<Vec<CommissionPayout>> {
        if actor.role != Role::Driver {
            return Err(CommissionError::Forbidden {
                role: actor.role,
                action: "list their own payouts",
            });
        }
        let driver_id = DriverId::new(actor.id.clone());
        let mut rows = self.store_call(self.store.for_driver(&driver_id)).await?;
        rows.sort_by(|a, b| b.initiated.at.cmp(&a.initiated.at));
        Ok(rows)
    }

    /// Payout history, newest first. Managers and the owner see every row
    /// and may narrow by driver or status; drivers only ever see their own.
    pub async fn history(
        &self,
        actor: &Actor,
        filter: HistoryFilter,
    ) -> Result<Vec<CommissionPayout>> {
        let scope = match actor.role {
            Role::Driver => Some(DriverId::new(actor.id.clone())),
            Role::Owner | Role::Manager => filter.driver_id,
        };
        let mut rows = match &scope {
            Some(driver_id) => self.store_call(self.store.for_driver(driver_id)).await?,
            None => self.store_call(self.store.all()).await?,
        };
        if let Some(status) = filter.status {
            rows.retain(|p| p.status == status);
        }
        rows.sort_by(|a, b| b.initiated.at.cmp(&a.initiated.at));
        Ok(rows)
    }

    /// Storage path of the receipt document, once the worker has issued it.
    pub async fn receipt_path(&self, actor: &Actor, payout_id: PayoutId) -> Result<String> {
        let payout = self.get(actor, payout_id).await?;
        payout
            .receipt_path
            .ok_or(CommissionError::ReceiptNotReady(payout_id))
    }

    /// Delivered orders of the period that no live payout holds. Rejected
    /// and cancelled payouts do not bind, so their orders show up here again.
    async fn eligible_orders(
        &self,
        driver_id: &DriverId,
        period: PayPeriod,
    ) -> Result<Vec<DeliveredOrder>> {
        let delivered = {
            let ledger = self.ledger.clone();
            let driver_id = driver_id.clone();
            retry_with_backoff(&self.retry, move |_| {
                let ledger = ledger.clone();
                let driver_id = driver_id.clone();
                async move { ledger.delivered_for_driver(&driver_id, &period).await }
            })
            .await?
        };

        let mut bound = BTreeSet::new();
        for payout in self.store_call(self.store.for_driver(driver_id)).await? {
            if payout.status.binds_orders() {
                bound.extend(payout.order_ids.iter().cloned());
            }
        }

        Ok(delivered
            .into_iter()
            .filter(|order| order.shipment_status.is_delivered() && !bound.contains(&order.id))
            .collect())
    }

    async fn load(&self, payout_id: PayoutId) -> Result<CommissionPayout> {
        self.store_call(self.store.get(payout_id))
            .await?
            .ok_or(CommissionError::PayoutNotFound(payout_id))
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
