//! Ticket endpoints.
//!
//! - `GET /api/tickets/:id` - a ticket, its event and its share link
//! - `GET /api/owners/:owner_id/tickets` - an identity's tickets, newest first

use super::error::AppError;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use boxoffice_core::link::TicketLink;
use boxoffice_core::types::{Event, Ticket, TicketId, TicketWithEvent, UserId};
use serde::{Deserialize, Serialize};

/// A ticket as rendered on the ticket page.
#[derive(Debug, Serialize, Deserialize)]
pub struct TicketView {
    /// The ticket
    pub ticket: Ticket,
    /// Its event
    pub event: Event,
    /// Shareable URL, also the QR payload
    pub share_url: TicketLink,
}

impl TicketView {
    fn new(state: &AppState, joined: TicketWithEvent) -> Self {
        Self {
            share_url: state.share_link(&joined.ticket.id),
            ticket: joined.ticket,
            event: joined.event,
        }
    }
}

/// Resolve a ticket id. Anyone holding the id may view the ticket.
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketView>, AppError> {
    let joined = state.issuer.lookup(&TicketId::from_string(ticket_id)).await?;
    Ok(Json(TicketView::new(&state, joined)))
}

/// Every ticket owned by one identity, newest first.
pub async fn list_owner_tickets(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<TicketView>>, AppError> {
    let tickets = state
        .issuer
        .tickets_for_owner(&UserId::from_string(owner_id))
        .await?;
    Ok(Json(
        tickets
            .into_iter()
            .map(|joined| TicketView::new(&state, joined))
            .collect(),
    ))
}
