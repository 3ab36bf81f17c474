//! Application layer orchestrating the payout core.
//!
//! The `PayoutEngine` is the single entry point for state-machine
//! operations; aggregation and the wallet are read models beside it, and
//! the receipt worker runs behind an outbox channel so document generation
//! never blocks an approval.

pub mod aggregation;
pub mod engine;
pub mod receipts;
pub mod retry;
pub mod wallet;
