//! Driver commission payout engine.
//!
//! Aggregates delivered orders into per-driver commission figures, runs the
//! multi-party payout approval flow (initiate, approve or reject, cancel,
//! settle), issues receipt documents, and serves both over an HTTP API with
//! a live event stream.
//!
//! The crate is split hexagonally: [`domain`] holds the records and ports,
//! [`application`] the services that enforce the business rules,
//! [`infrastructure`] the storage and notification adapters, and
//! [`interfaces`] the CSV and HTTP edges.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
