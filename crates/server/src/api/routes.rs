use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::metrics_middleware;
use super::{handlers, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health, config and status
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/status", get(handlers::get_status))
        .route("/metrics", get(handlers::metrics))
        // Tickets
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets/{number}", get(tickets::get_ticket))
        .route("/tickets/{number}/scope", post(tickets::scope_ticket))
        .route(
            "/tickets/{number}/scope/regenerate",
            post(tickets::regenerate_scope),
        )
        .route("/tickets/{number}/execute", post(tickets::execute_ticket))
        .route("/tickets/{number}/cancel", post(tickets::cancel_ticket))
        .route("/tickets/{number}/complete", post(tickets::complete_ticket))
        // Jobs
        .route("/tickets/{number}/job", get(tickets::get_job))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
