//! Purchase endpoint.
//!
//! `POST /api/purchases` issues exactly one ticket or fails with one of the
//! stable codes `VALIDATION_ERROR`, `EVENT_NOT_FOUND`, `SOLD_OUT` or
//! `STORE_FAILURE`.

use super::error::AppError;
use crate::server::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use boxoffice_core::link::TicketLink;
use boxoffice_core::types::{EventId, Ticket, UserId};
use boxoffice_runtime::issuer::PurchaseRequest;
use serde::{Deserialize, Serialize};

/// Purchase request body.
#[derive(Debug, Deserialize, Serialize)]
pub struct PurchaseBody {
    /// Event to buy a ticket for
    pub event_id: String,
    /// Where the ticket is sent
    pub owner_email: String,
    /// Authenticated buyer; omit for a guest purchase
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl From<PurchaseBody> for PurchaseRequest {
    fn from(body: PurchaseBody) -> Self {
        let event_id = EventId::from_string(body.event_id);
        match body.owner_id {
            Some(owner_id) => Self::for_user(event_id, body.owner_email, UserId::from_string(owner_id)),
            None => Self::guest(event_id, body.owner_email),
        }
    }
}

/// The issued ticket and where it can be shared.
#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseResponse {
    /// The issued ticket
    #[serde(flatten)]
    pub ticket: Ticket,
    /// Shareable URL, also the QR payload
    pub share_url: TicketLink,
}

/// Issue one ticket.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/purchases \
///   -H "Content-Type: application/json" \
///   -d '{"event_id":"event-1","owner_email":"fan@example.com"}'
/// ```
pub async fn create_purchase(
    State(state): State<AppState>,
    Json(body): Json<PurchaseBody>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let ticket = state.issuer.issue(body.into()).await?;
    let share_url = state.share_link(&ticket.id);
    Ok((StatusCode::CREATED, Json(PurchaseResponse { ticket, share_url })))
}
