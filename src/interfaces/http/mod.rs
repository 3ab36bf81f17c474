//! HTTP surface of the commission engine.
//!
//! One axum router, everything commission-related nested under
//! `/commission`, plus a bare `/health`. Identity comes from headers via
//! the [`actor`] extractor; errors render through the shared mapping in
//! [`error`].

pub mod actor;
pub mod error;
pub mod events;
pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Builds the service router with tracing and CORS middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/commission", commission_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn commission_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(handlers::dashboard))
        .route("/initiate", post(handlers::initiate))
        .route("/{id}/approve", post(handlers::approve))
        .route("/{id}/reject", post(handlers::reject))
        .route("/{id}/cancel", post(handlers::cancel))
        .route("/{id}/paid", post(handlers::mark_paid))
        .route("/{id}/receipt", get(handlers::receipt))
        .route("/my-payouts", get(handlers::my_payouts))
        .route("/history", get(handlers::history))
        .route("/wallet/{driver_id}", get(handlers::wallet))
        .route("/events", get(events::events))
}

/// Same routes without middleware, for tests that inspect raw responses.
#[cfg(test)]
pub fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/commission", commission_routes())
        .with_state(state)
}
