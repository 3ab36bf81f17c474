use crate::domain::payout::CommissionPayout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles that reach the payout core. Sales agents and investors exist in the
/// wider platform but never touch commission payouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Manager,
    Driver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Owner => "owner",
            Self::Manager => "manager",
            Self::Driver => "driver",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "manager" => Ok(Self::Manager),
            "driver" => Ok(Self::Driver),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The identity every state-machine operation is performed as.
///
/// Authentication lives outside this crate; the engine still re-validates
/// the actor against each payout, so a handler bug upstream cannot move
/// money on someone else's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn owner(id: impl Into<String>) -> Self {
        Self::new(id, Role::Owner)
    }

    pub fn manager(id: impl Into<String>) -> Self {
        Self::new(id, Role::Manager)
    }

    pub fn driver(id: impl Into<String>) -> Self {
        Self::new(id, Role::Driver)
    }

    /// Payouts are initiated by the business side, never by drivers.
    pub fn can_initiate(&self) -> bool {
        matches!(self.role, Role::Owner | Role::Manager)
    }

    /// Only the driver the payout is addressed to may approve it.
    pub fn can_approve(&self, payout: &CommissionPayout) -> bool {
        self.role == Role::Driver && self.id == payout.driver_id.as_str()
    }

    /// Rejection is the driver-side counterpart of approval.
    pub fn can_reject(&self, payout: &CommissionPayout) -> bool {
        self.can_approve(payout)
    }

    /// Withdrawal before the driver acts: the initiating manager, or the
    /// owner overriding on their behalf.
    pub fn can_cancel(&self, payout: &CommissionPayout) -> bool {
        match self.role {
            Role::Owner => true,
            Role::Manager => self.id == payout.manager_id.as_str(),
            Role::Driver => false,
        }
    }

    /// Settlement confirmation is a business-side step.
    pub fn can_mark_paid(&self) -> bool {
        matches!(self.role, Role::Owner | Role::Manager)
    }

    /// Drivers see their own payouts; managers and the owner see everything.
    pub fn can_view(&self, payout: &CommissionPayout) -> bool {
        match self.role {
            Role::Owner | Role::Manager => true,
            Role::Driver => self.id == payout.driver_id.as_str(),
        }
    }
}
