//! Edges of the service: CSV ingestion and the HTTP API.

pub mod csv;
pub mod http;
