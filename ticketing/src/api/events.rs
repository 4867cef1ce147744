//! Event catalogue endpoints.
//!
//! - `GET /api/events?search=&category=` - browse, soonest first
//! - `GET /api/events/:id` - one event with remaining capacity
//! - `GET /api/categories` - distinct categories
//! - `POST /api/events` - create an event (requires `x-admin-key`)

use super::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use boxoffice_core::types::{Capacity, Event, EventFilter, EventId, Money, NewEvent, parse_tags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header carrying the admin API key.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Admin request to create an event.
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateEventRequest {
    /// Event title
    pub title: String,
    /// Long-form description
    #[serde(default)]
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Venue or address
    pub location: String,
    /// Hero image; blank for a placeholder
    #[serde(default)]
    pub image_url: String,
    /// Category
    pub category: String,
    /// Ticket price in cents
    pub price_cents: u64,
    /// Organizer name
    pub organizer: String,
    /// Comma-separated tags, as typed into the admin form
    #[serde(default)]
    pub tags: String,
    /// Ticket limit; omit for unlimited
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl From<CreateEventRequest> for NewEvent {
    fn from(request: CreateEventRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            date: request.date,
            location: request.location,
            image_url: request.image_url,
            category: request.category,
            price: Money::from_cents(request.price_cents),
            organizer: request.organizer,
            tags: parse_tags(&request.tags),
            capacity: request.capacity.map(Capacity::new),
        }
    }
}

/// An event plus the derived availability fields the storefront renders.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    /// The event record
    #[serde(flatten)]
    pub event: Event,
    /// Tickets left; `null` when unlimited
    pub tickets_remaining: Option<u32>,
    /// Whether purchases will be refused
    pub sold_out: bool,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            tickets_remaining: event.tickets_remaining(),
            sold_out: event.is_sold_out(),
            event,
        }
    }
}

/// List events matching the query, soonest first.
///
/// ```bash
/// curl 'http://localhost:8080/api/events?category=Music&search=jazz'
/// ```
pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let events = state.catalog.list(&filter).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

/// Get one event.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<EventResponse>, AppError> {
    let event = state.catalog.get(&EventId::from_string(event_id)).await?;
    Ok(Json(event.into()))
}

/// Distinct categories, alphabetical.
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.catalog.categories().await?))
}

/// Create an event.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events \
///   -H "x-admin-key: $ADMIN_API_KEY" \
///   -H "Content-Type: application/json" \
///   -d '{"title":"Midnight Art Gala","date":"2025-11-05T19:00:00Z",
///        "location":"The Void Gallery","category":"Art","price_cents":15000,
///        "organizer":"Void Collective","tags":"art, gala","capacity":200}'
/// ```
pub async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    authorize_admin(&state, &headers)?;
    let event = state.catalog.create(request.into()).await?;
    metrics::counter!("boxoffice_events_created_total").increment(1);
    Ok((StatusCode::CREATED, Json(event.into())))
}

fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.storefront.admin_api_key.as_deref() else {
        return Err(AppError::forbidden("Event administration is disabled"));
    };

    match headers.get(ADMIN_KEY_HEADER).map(|value| value.to_str()) {
        None => Err(AppError::unauthorized("Missing admin key")),
        Some(Ok(provided)) if provided == expected => Ok(()),
        Some(_) => {
            tracing::warn!("Rejected event creation with a wrong admin key");
            Err(AppError::forbidden("Invalid admin key"))
        }
    }
}
