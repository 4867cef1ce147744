//! Inventory ledger: the gatekeeper for event capacity.
//!
//! Every ticket starts life as a [`Reservation`] taken here. The ledger does
//! no locking of its own; the check-and-increment is delegated to
//! [`EventStore::try_reserve`], which performs it atomically in the shared
//! store so that any number of ledger instances (one per server process)
//! still never oversell.

use crate::metrics::LedgerMetrics;
use boxoffice_core::error::{ReserveError, StoreError};
use boxoffice_core::store::{EventStore, ReserveOutcome};
use boxoffice_core::types::{Capacity, EventId};
use std::sync::Arc;
use tracing::{debug, warn};

/// One unit of capacity claimed for an event.
///
/// A reservation must end in exactly one of: a persisted ticket, or a call to
/// [`InventoryLedger::release`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use = "a reservation must either back a ticket or be released"]
pub struct Reservation {
    event_id: EventId,
    tickets_sold: u32,
    capacity: Option<Capacity>,
}

impl Reservation {
    /// Event the unit was claimed from.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Sold count including this reservation.
    #[must_use]
    pub const fn tickets_sold(&self) -> u32 {
        self.tickets_sold
    }

    /// Capacity at reservation time.
    #[must_use]
    pub const fn capacity(&self) -> Option<Capacity> {
        self.capacity
    }
}

/// Reserves and releases event capacity.
#[derive(Clone)]
pub struct InventoryLedger {
    events: Arc<dyn EventStore>,
}

impl InventoryLedger {
    /// Create a ledger over the shared event store.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self { events }
    }

    /// Claim one unit of capacity for `event_id`.
    ///
    /// Events without a capacity always succeed. For capacity-limited events
    /// the sold count never exceeds the capacity, however many callers race.
    ///
    /// # Errors
    ///
    /// - [`ReserveError::EventNotFound`] if the event does not exist
    /// - [`ReserveError::SoldOut`] if capacity is exhausted
    /// - [`ReserveError::Store`] if the store failed (nothing was reserved)
    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    pub async fn reserve(&self, event_id: &EventId) -> Result<Reservation, ReserveError> {
        let outcome = match self.events.try_reserve(event_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                LedgerMetrics::record_reservation("error");
                warn!(error = %err, "Reservation failed at the store");
                return Err(err.into());
            }
        };

        match outcome {
            ReserveOutcome::Reserved {
                tickets_sold,
                capacity,
            } => {
                LedgerMetrics::record_reservation("reserved");
                debug!(tickets_sold, capacity = ?capacity.map(|c| c.value()), "Reserved one unit");
                Ok(Reservation {
                    event_id: event_id.clone(),
                    tickets_sold,
                    capacity,
                })
            }
            ReserveOutcome::SoldOut => {
                LedgerMetrics::record_reservation("sold_out");
                debug!("Event is sold out");
                Err(ReserveError::SoldOut(event_id.clone()))
            }
            ReserveOutcome::NotFound => {
                LedgerMetrics::record_reservation("not_found");
                debug!("Event not found");
                Err(ReserveError::EventNotFound(event_id.clone()))
            }
        }
    }

    /// Give a reservation's unit back.
    ///
    /// Returns `true` if the sold count was decremented. `false` means there
    /// was nothing to give back (event deleted or count already zero).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store failed; the unit may still be held.
    #[tracing::instrument(skip(self, reservation), fields(event_id = %reservation.event_id))]
    pub async fn release(&self, reservation: &Reservation) -> Result<bool, StoreError> {
        let released = self.events.release(&reservation.event_id).await?;
        if released {
            debug!("Released one unit");
        } else {
            warn!("Release found nothing to give back");
        }
        Ok(released)
    }
}
