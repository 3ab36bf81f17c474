use crate::domain::ids::{Country, DriverId};
use crate::domain::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Directory read model for a delivery driver.
///
/// `commission_rate` is the fixed amount owed per delivered order,
/// configured per driver in the driver's operating currency; it is copied
/// onto each payout at initiation so later rate changes never touch a payout
/// that already left `unpaid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: DriverId,
    pub name: String,
    pub country: Country,
    pub currency: Currency,
    pub commission_rate: Money,
}

impl DriverProfile {
    pub fn new(
        id: impl Into<DriverId>,
        name: impl Into<String>,
        country: impl Into<Country>,
        commission_rate: Money,
    ) -> Self {
        let currency = commission_rate.currency().clone();
        Self {
            id: id.into(),
            name: name.into(),
            country: country.into(),
            currency,
            commission_rate,
        }
    }
}
