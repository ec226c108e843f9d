//! HTTP adapter for the linen stock ledger.
//!
//! Exposes the ledger transitions, the housekeeping workflows and the
//! movement history over REST, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use stock_store::{ReferenceStore, StockStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, R>(state: Arc<AppState<S, R>>, metrics_handle: PrometheusHandle) -> Router
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/stock", get(routes::stock::list::<S, R>))
        .route("/stock/{item_id}", get(routes::stock::get::<S, R>))
        .route("/stock/{item_id}/restock", post(routes::stock::restock::<S, R>))
        .route(
            "/stock/{item_id}/write-off",
            post(routes::stock::write_off::<S, R>),
        )
        .route("/rooms/{room_id}", get(routes::rooms::status::<S, R>))
        .route("/rooms/{room_id}/clean", post(routes::rooms::clean::<S, R>))
        .route(
            "/rooms/{room_id}/deliveries",
            post(routes::rooms::deliver::<S, R>).get(routes::rooms::room_deliveries::<S, R>),
        )
        .route("/deliveries", get(routes::rooms::recent::<S, R>))
        .route(
            "/laundry/receptions",
            post(routes::laundry::receive::<S, R>),
        )
        .route("/movements", get(routes::history::movements::<S, R>))
        .route("/history", get(routes::history::events::<S, R>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the shared state and registers counters for the catalog.
pub async fn create_state<S, R>(store: S, reference: R) -> ledger::Result<Arc<AppState<S, R>>>
where
    S: StockStore + Clone + 'static,
    R: ReferenceStore + Clone + 'static,
{
    let state = AppState::new(store, reference);
    state.sync_catalog().await?;
    Ok(Arc::new(state))
}
