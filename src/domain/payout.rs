use crate::domain::ids::{DriverId, ManagerId, OrderId, PayoutId};
use crate::domain::money::Money;
use crate::domain::order::PayPeriod;
use crate::error::{CommissionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lifecycle of a commission payout.
///
/// `unpaid` is virtual: it is the absence of a record, so it never appears
/// here. A record is born in `PendingApproval` and moves only along
/// [`can_transition_to`](Self::can_transition_to):
///
/// ```text
/// pending_approval ──→ approved ──→ paid
///        │
///        ├──→ rejected
///        └──→ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    PendingApproval,
    Approved,
    Paid,
    Rejected,
    Cancelled,
}

impl PayoutStatus {
    /// True when no transition leaves this state. `Approved` is not listed:
    /// it still admits the optional settlement confirmation to `Paid`.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Rejected | Self::Cancelled)
    }

    pub const fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::PendingApproval, Self::Approved)
                | (Self::PendingApproval, Self::Rejected)
                | (Self::PendingApproval, Self::Cancelled)
                | (Self::Approved, Self::Paid)
        )
    }

    /// Whether a payout in this state holds its orders: bound orders cannot
    /// be claimed by another payout. Rejection and cancellation release the
    /// orders while the rows stay behind as audit trail.
    pub const fn binds_orders(&self) -> bool {
        matches!(self, Self::PendingApproval | Self::Approved | Self::Paid)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Who did something, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStamp {
    pub at: DateTime<Utc>,
    pub by: String,
}

impl ActionStamp {
    pub fn now(by: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            by: by.into(),
        }
    }
}

/// A bounded, approvable claim against a set of delivered orders.
///
/// Amounts and the order set are fixed at initiation and never change
/// afterwards; every later step only moves `status`, stamps the acting
/// party, and (on approval) attaches the receipt path. Rows are never
/// deleted, so rejected and cancelled payouts remain readable as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionPayout {
    pub id: PayoutId,
    pub driver_id: DriverId,
    /// The initiating business-side actor. When the owner initiated, this
    /// holds the owner's id and `owner_id` is set as well.
    pub manager_id: ManagerId,
    pub owner_id: Option<String>,
    pub period: PayPeriod,
    pub order_ids: BTreeSet<OrderId>,
    pub total_orders: u64,
    pub total_earnings: Money,
    pub commission_rate: Money,
    pub commission_amount: Money,
    pub status: PayoutStatus,
    pub payment_method: String,
    pub payment_note: Option<String>,
    pub payment_reference: Option<String>,
    pub initiated: ActionStamp,
    pub approved: Option<ActionStamp>,
    pub driver_note: Option<String>,
    pub paid: Option<ActionStamp>,
    pub rejected: Option<ActionStamp>,
    pub rejection_reason: Option<String>,
    pub cancelled: Option<ActionStamp>,
    pub receipt_path: Option<String>,
}

impl CommissionPayout {
    /// Creates the record in `pending_approval` with its orders bound and
    /// `commission_amount = total_orders x commission_rate`.
    #[allow(clippy::too_many_arguments)]
    pub fn initiate(
        driver_id: DriverId,
        manager_id: ManagerId,
        owner_id: Option<String>,
        period: PayPeriod,
        order_ids: BTreeSet<OrderId>,
        total_earnings: Money,
        commission_rate: Money,
        payment_method: String,
        payment_note: Option<String>,
    ) -> Self {
        let total_orders = order_ids.len() as u64;
        let commission_amount = commission_rate.scaled(total_orders.into());
        let initiated = ActionStamp::now(manager_id.as_str());
        Self {
            id: PayoutId::generate(),
            driver_id,
            manager_id,
            owner_id,
            period,
            order_ids,
            total_orders,
            total_earnings,
            commission_rate,
            commission_amount,
            status: PayoutStatus::PendingApproval,
            payment_method,
            payment_note,
            payment_reference: None,
            initiated,
            approved: None,
            driver_note: None,
            paid: None,
            rejected: None,
            rejection_reason: None,
            cancelled: None,
            receipt_path: None,
        }
    }

    fn transition(&mut self, target: PayoutStatus, action: &'static str) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(CommissionError::InvalidTransition {
                payout_id: self.id,
                status: self.status,
                action,
            });
        }
        self.status = target;
        Ok(())
    }

    pub fn approve(&mut self, by: impl Into<String>, driver_note: Option<String>) -> Result<()> {
        self.transition(PayoutStatus::Approved, "approve")?;
        self.approved = Some(ActionStamp::now(by));
        self.driver_note = driver_note;
        Ok(())
    }

    /// `reason` must already be validated non-empty by the caller; it is
    /// stored verbatim for the manager to read.
    pub fn reject(&mut self, by: impl Into<String>, reason: String) -> Result<()> {
        self.transition(PayoutStatus::Rejected, "reject")?;
        self.rejected = Some(ActionStamp::now(by));
        self.rejection_reason = Some(reason);
        Ok(())
    }

    pub fn cancel(&mut self, by: impl Into<String>) -> Result<()> {
        self.transition(PayoutStatus::Cancelled, "cancel")?;
        self.cancelled = Some(ActionStamp::now(by));
        Ok(())
    }

    pub fn mark_paid(&mut self, by: impl Into<String>, payment_reference: String) -> Result<()> {
        self.transition(PayoutStatus::Paid, "mark paid")?;
        self.paid = Some(ActionStamp::now(by));
        self.payment_reference = Some(payment_reference);
        Ok(())
    }

    /// Whether this payout currently holds `order_id` against other claims.
    pub fn binds(&self, order_id: &OrderId) -> bool {
        self.status.binds_orders() && self.order_ids.contains(order_id)
    }
}
