use crate::domain::ids::{DriverId, ManagerId, PayoutId};
use crate::domain::payout::CommissionPayout;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic of one payout lifecycle event, named after the transition that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutTopic {
    #[serde(rename = "commission.pending_approval")]
    PendingApproval,
    #[serde(rename = "commission.approved")]
    Approved,
    #[serde(rename = "commission.rejected")]
    Rejected,
    #[serde(rename = "commission.cancelled")]
    Cancelled,
    #[serde(rename = "commission.paid")]
    Paid,
}

impl fmt::Display for PayoutTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PendingApproval => "commission.pending_approval",
            Self::Approved => "commission.approved",
            Self::Rejected => "commission.rejected",
            Self::Cancelled => "commission.cancelled",
            Self::Paid => "commission.paid",
        };
        f.write_str(s)
    }
}

/// Cache-invalidation signal for dashboards: consumers re-fetch the
/// authoritative payout state rather than applying the payload as a delta,
/// so duplicate or dropped deliveries are harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutEvent {
    pub topic: PayoutTopic,
    pub payout_id: PayoutId,
    pub driver_id: DriverId,
    pub manager_id: ManagerId,
}

impl PayoutEvent {
    pub fn of(topic: PayoutTopic, payout: &CommissionPayout) -> Self {
        Self {
            topic,
            payout_id: payout.id,
            driver_id: payout.driver_id.clone(),
            manager_id: payout.manager_id.clone(),
        }
    }
}
