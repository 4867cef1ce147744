//! Store traits for events and tickets.
//!
//! The engine talks to its backing store exclusively through these traits.
//! Two implementations exist:
//!
//! - `PostgresStore` (in `boxoffice-postgres`): production storage
//! - `InMemoryStore` (in `boxoffice-testing`): fast, deterministic tests
//!
//! # Atomicity
//!
//! [`EventStore::try_reserve`] is the one operation with a hard concurrency
//! contract: the "is there capacity left?" check and the increment of
//! `tickets_sold` must be a single serializable unit **inside the store**. Two
//! concurrent callers must never both observe `tickets_sold == capacity - 1`
//! and both succeed. Callers do not (and cannot) add client-side locking to
//! make up for a store that gets this wrong.
//!
//! # Dyn Compatibility
//!
//! These traits use explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so they can be held as `Arc<dyn EventStore>`. Implementations
//! should clone borrowed arguments before building the future.

use crate::error::StoreError;
use crate::types::{Capacity, Event, EventFilter, EventId, Ticket, TicketId, TicketWithEvent, UserId};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Result of an atomic reserve attempt at the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// One unit was claimed; `tickets_sold` is the count after the increment.
    Reserved {
        /// Sold count including this reservation
        tickets_sold: u32,
        /// The event's capacity at reservation time
        capacity: Option<Capacity>,
    },
    /// Capacity was already exhausted; nothing changed.
    SoldOut,
    /// No such event; nothing changed.
    NotFound,
}

/// Event persistence, including the atomic capacity counter.
pub trait EventStore: Send + Sync {
    /// Persist a newly created event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails or the id already exists.
    fn create_event(&self, event: Event) -> StoreFuture<'_, Event>;

    /// Load one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails. A missing event is `Ok(None)`.
    fn get_event(&self, id: &EventId) -> StoreFuture<'_, Option<Event>>;

    /// List events matching `filter`, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn list_events(&self, filter: &EventFilter) -> StoreFuture<'_, Vec<Event>>;

    /// Atomically claim one unit of capacity.
    ///
    /// Unlimited events always succeed. Capacity-limited events succeed only
    /// while `tickets_sold < capacity`, and the check plus increment happen as
    /// one serializable step. On success the increment is durable before the
    /// future resolves.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store failed; in that case nothing was
    /// reserved.
    fn try_reserve(&self, id: &EventId) -> StoreFuture<'_, ReserveOutcome>;

    /// Give back one unit of capacity (compensation for a failed issuance).
    ///
    /// Returns `true` if the counter was decremented, `false` if the event is
    /// missing or already at zero. Never drives `tickets_sold` below zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn release(&self, id: &EventId) -> StoreFuture<'_, bool>;
}

/// Ticket persistence and ticket queries.
pub trait TicketStore: Send + Sync {
    /// Persist an issued ticket.
    ///
    /// Idempotent by ticket id: inserting the same ticket twice is a no-op,
    /// which lets the issuer retry a write whose acknowledgement was lost.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn insert_ticket(&self, ticket: &Ticket) -> StoreFuture<'_, ()>;

    /// Load a ticket together with its event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails. A missing ticket is `Ok(None)`.
    fn get_ticket(&self, id: &TicketId) -> StoreFuture<'_, Option<TicketWithEvent>>;

    /// All tickets owned by `owner`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn tickets_for_owner(&self, owner: &UserId) -> StoreFuture<'_, Vec<TicketWithEvent>>;
}
