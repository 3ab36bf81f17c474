//! Domain model of the commission payout core: value objects, the payout
//! record with its transition table, and the ports to external collaborators.

pub mod actor;
pub mod driver;
pub mod events;
pub mod ids;
pub mod money;
pub mod order;
pub mod payout;
pub mod ports;
