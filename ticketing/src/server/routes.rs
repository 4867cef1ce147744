//! Router configuration for the storefront API.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{events, purchases, tickets};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health checks live at the root; everything else is nested under `/api`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Catalogue
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/:id", get(events::get_event))
        .route("/categories", get(events::list_categories))
        // Issuance
        .route("/purchases", post(purchases::create_purchase))
        // Tickets
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/owners/:owner_id/tickets", get(tickets::list_owner_tickets));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
