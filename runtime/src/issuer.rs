//! Ticket issuer: turns a purchase request into exactly one durable ticket.
//!
//! A purchase is two writes: claim a unit of capacity, then persist the
//! ticket. They are tied together as a reservation plus a compensable write:
//!
//! 1. validate the request (nothing is reserved for bad input)
//! 2. reserve one unit through the [`InventoryLedger`]
//! 3. insert the ticket, retrying with the same ticket id
//! 4. if every insert reported failure, read the ticket back: a write whose
//!    acknowledgement was lost counts as issued
//! 5. only a ticket confirmed absent has its unit released
//!
//! A unit is never released while its ticket might exist, so a ticket
//! without a sold unit cannot happen. The reverse, a held unit without a
//! ticket, remains when the read-back or the release keeps failing. That
//! under-sells rather than oversells and is logged at `error` level with the
//! event id.

use crate::ledger::{InventoryLedger, Reservation};
use crate::metrics::IssuanceMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use boxoffice_core::environment::Clock;
use boxoffice_core::error::{LookupError, PurchaseError, StoreError, ValidationError};
use boxoffice_core::store::{EventStore, TicketStore};
use boxoffice_core::types::{Email, EventId, Ticket, TicketId, TicketWithEvent, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Input to [`TicketIssuer::issue`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Event to buy a ticket for
    pub event_id: EventId,
    /// Where the ticket goes; validated before anything is reserved
    pub owner_email: String,
    /// Buyer identity; absent for guest checkout
    #[serde(default)]
    pub owner_id: Option<UserId>,
}

impl PurchaseRequest {
    /// Guest purchase (no identity).
    #[must_use]
    pub fn guest(event_id: EventId, owner_email: impl Into<String>) -> Self {
        Self {
            event_id,
            owner_email: owner_email.into(),
            owner_id: None,
        }
    }

    /// Purchase on behalf of a signed-in user.
    #[must_use]
    pub fn for_user(event_id: EventId, owner_email: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            event_id,
            owner_email: owner_email.into(),
            owner_id: Some(owner_id),
        }
    }

    fn validate(&self) -> Result<Email, ValidationError> {
        let email = Email::parse(&self.owner_email)?;
        if self
            .owner_id
            .as_ref()
            .is_some_and(|owner_id| owner_id.as_str().trim().is_empty())
        {
            return Err(ValidationError::Invalid {
                field: "owner_id",
                reason: "must not be blank".to_string(),
            });
        }
        Ok(email)
    }
}

/// Issues, looks up and lists tickets.
#[derive(Clone)]
pub struct TicketIssuer {
    ledger: InventoryLedger,
    tickets: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl TicketIssuer {
    /// Create an issuer with the default retry policy.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventStore>,
        tickets: Arc<dyn TicketStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger: InventoryLedger::new(events),
            tickets,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy for the ticket write and its compensation.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The ledger this issuer reserves through.
    #[must_use]
    pub const fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    /// Issue one ticket.
    ///
    /// # Errors
    ///
    /// - [`PurchaseError::Validation`] for a malformed email or blank owner id
    /// - [`PurchaseError::EventNotFound`] / [`PurchaseError::SoldOut`] straight
    ///   from the ledger
    /// - [`PurchaseError::Store`] if reserving or persisting failed. The unit
    ///   is released once the ticket is known not to exist; if that cannot be
    ///   established the unit stays sold.
    #[tracing::instrument(skip(self, request), fields(event_id = %request.event_id, guest = request.owner_id.is_none()))]
    pub async fn issue(&self, request: PurchaseRequest) -> Result<Ticket, PurchaseError> {
        let started = Instant::now();

        let owner_email = request.validate().inspect_err(|err| {
            debug!(error = %err, "Rejected purchase request");
        })?;

        let reservation = self.ledger.reserve(&request.event_id).await.inspect_err(|err| {
            warn!(error = %err, "Purchase not reserved");
        })?;

        let ticket = Ticket {
            id: TicketId::new(),
            event_id: request.event_id,
            owner_id: request.owner_id,
            owner_email,
            created_at: self.clock.now(),
        };

        let tickets = &self.tickets;
        let pending = &ticket;
        let written =
            retry_with_backoff(&self.retry, "insert_ticket", move || tickets.insert_ticket(pending))
                .await;

        if let Err(err) = written {
            match self.ticket_exists(&ticket.id).await {
                Ok(true) => {
                    warn!(ticket_id = %ticket.id, error = %err, "Ticket write reported failure but landed");
                }
                Ok(false) => {
                    warn!(ticket_id = %ticket.id, error = %err, "Ticket write failed, releasing reservation");
                    self.compensate(&reservation).await;
                    return Err(PurchaseError::Store(err));
                }
                Err(check) => {
                    IssuanceMetrics::record_compensation("unverified");
                    error!(
                        event_id = %reservation.event_id(),
                        ticket_id = %ticket.id,
                        error = %check,
                        "Could not tell whether the ticket was written; keeping the reservation"
                    );
                    return Err(PurchaseError::Store(err));
                }
            }
        }

        IssuanceMetrics::record_issued(started.elapsed());
        info!(
            ticket_id = %ticket.id,
            tickets_sold = reservation.tickets_sold(),
            "Ticket issued"
        );
        Ok(ticket)
    }

    async fn ticket_exists(&self, ticket_id: &TicketId) -> Result<bool, StoreError> {
        let tickets = &self.tickets;
        retry_with_backoff(&self.retry, "verify_ticket", move || tickets.get_ticket(ticket_id))
            .await
            .map(|found| found.is_some())
    }

    async fn compensate(&self, reservation: &Reservation) {
        let ledger = &self.ledger;
        match retry_with_backoff(&self.retry, "release_reservation", move || {
            ledger.release(reservation)
        })
        .await
        {
            Ok(_) => {
                IssuanceMetrics::record_compensation("released");
                info!(event_id = %reservation.event_id(), "Reservation released");
            }
            Err(err) => {
                IssuanceMetrics::record_compensation("failed");
                error!(
                    event_id = %reservation.event_id(),
                    error = %err,
                    "Reservation could not be released; tickets_sold is one higher than issued tickets"
                );
            }
        }
    }

    /// Resolve a ticket id to the ticket and its event.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] for an unknown id, [`LookupError::Store`] if
    /// the store failed.
    #[tracing::instrument(skip(self), fields(ticket_id = %ticket_id))]
    pub async fn lookup(&self, ticket_id: &TicketId) -> Result<TicketWithEvent, LookupError> {
        self.tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| LookupError::NotFound(ticket_id.clone()))
    }

    /// Every ticket owned by `owner`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store failed.
    #[tracing::instrument(skip(self), fields(owner_id = %owner))]
    pub async fn tickets_for_owner(&self, owner: &UserId) -> Result<Vec<TicketWithEvent>, StoreError> {
        self.tickets.tickets_for_owner(owner).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_request_owner_is_optional() {
        let guest: PurchaseRequest =
            serde_json::from_str(r#"{"event_id":"event-1","owner_email":"fan@example.com"}"#).unwrap();
        assert_eq!(guest, PurchaseRequest::guest(EventId::from_string("event-1"), "fan@example.com"));

        let json = serde_json::to_value(PurchaseRequest::for_user(
            EventId::from_string("event-2"),
            "ada@example.com",
            UserId::from_string("u-1"),
        ))
        .unwrap();
        assert_eq!(json["event_id"], "event-2");
        assert_eq!(json["owner_id"], "u-1");
    }

    #[test]
    fn test_blank_owner_id_is_rejected() {
        let request = PurchaseRequest::for_user(
            EventId::from_string("event-1"),
            "ada@example.com",
            UserId::from_string("  "),
        );
        assert!(matches!(
            request.validate(),
            Err(ValidationError::Invalid { field: "owner_id", .. })
        ));
    }
}
