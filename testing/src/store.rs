//! In-memory event and ticket storage.
//!
//! [`InMemoryStore`] implements both [`EventStore`] and [`TicketStore`] over
//! one mutex-protected table set. Holding that single lock across the
//! capacity check and the increment gives `try_reserve` the same atomicity
//! the Postgres store gets from its conditional `UPDATE`.

use boxoffice_core::error::StoreError;
use boxoffice_core::store::{EventStore, ReserveOutcome, StoreFuture, TicketStore};
use boxoffice_core::types::{Event, EventFilter, EventId, Ticket, TicketId, TicketWithEvent, UserId};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    tickets: HashMap<TicketId, (u64, Ticket)>,
    next_seq: u64,
}

impl Tables {
    fn join(&self, ticket: &Ticket) -> Result<TicketWithEvent, StoreError> {
        let event = self.events.get(&ticket.event_id).ok_or_else(|| {
            StoreError::Integrity(format!(
                "ticket {} references missing event {}",
                ticket.id, ticket.event_id
            ))
        })?;
        Ok(TicketWithEvent {
            ticket: ticket.clone(),
            event: event.clone(),
        })
    }
}

/// In-memory store for fast, deterministic tests and the demo server.
///
/// # Example
///
/// ```
/// use boxoffice_testing::InMemoryStore;
/// use boxoffice_core::store::{EventStore, ReserveOutcome};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// let event = store.seed_event(boxoffice_testing::fixtures::event_with_capacity("Show", Some(1)));
///
/// assert!(matches!(store.try_reserve(&event.id).await?, ReserveOutcome::Reserved { .. }));
/// assert_eq!(store.try_reserve(&event.id).await?, ReserveOutcome::SoldOut);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    /// Insert or replace an event directly, bypassing validation.
    ///
    /// Returns the stored event. A poisoned lock leaves the store untouched.
    pub fn seed_event(&self, event: Event) -> Event {
        if let Ok(mut tables) = self.tables() {
            tables.events.insert(event.id.clone(), event.clone());
        }
        event
    }

    /// Current state of one event.
    #[must_use]
    pub fn event(&self, id: &EventId) -> Option<Event> {
        self.tables().ok()?.events.get(id).cloned()
    }

    /// Sold count of one event.
    #[must_use]
    pub fn tickets_sold(&self, id: &EventId) -> Option<u32> {
        self.event(id).map(|event| event.tickets_sold)
    }

    /// Number of persisted tickets for one event.
    #[must_use]
    pub fn ticket_count_for(&self, id: &EventId) -> usize {
        self.tables()
            .map(|tables| {
                tables
                    .tickets
                    .values()
                    .filter(|(_, ticket)| ticket.event_id == *id)
                    .count()
            })
            .unwrap_or_default()
    }

    /// Number of stored events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.tables().map(|tables| tables.events.len()).unwrap_or_default()
    }

    /// Total number of persisted tickets.
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.tables().map(|tables| tables.tickets.len()).unwrap_or_default()
    }
}

impl EventStore for InMemoryStore {
    fn create_event(&self, event: Event) -> StoreFuture<'_, Event> {
        Box::pin(async move {
            let mut tables = self.tables()?;
            if tables.events.contains_key(&event.id) {
                return Err(StoreError::Integrity(format!("event {} already exists", event.id)));
            }
            tables.events.insert(event.id.clone(), event.clone());
            Ok(event)
        })
    }

    fn get_event(&self, id: &EventId) -> StoreFuture<'_, Option<Event>> {
        let id = id.clone();
        Box::pin(async move { Ok(self.tables()?.events.get(&id).cloned()) })
    }

    fn list_events(&self, filter: &EventFilter) -> StoreFuture<'_, Vec<Event>> {
        let filter = filter.clone();
        Box::pin(async move {
            let mut events: Vec<Event> = self
                .tables()?
                .events
                .values()
                .filter(|event| filter.matches(event))
                .cloned()
                .collect();
            events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
            Ok(events)
        })
    }

    fn try_reserve(&self, id: &EventId) -> StoreFuture<'_, ReserveOutcome> {
        let id = id.clone();
        Box::pin(async move {
            let mut tables = self.tables()?;
            let Some(event) = tables.events.get_mut(&id) else {
                return Ok(ReserveOutcome::NotFound);
            };

            if event
                .capacity
                .is_some_and(|capacity| event.tickets_sold >= capacity.value())
            {
                return Ok(ReserveOutcome::SoldOut);
            }

            event.tickets_sold = event
                .tickets_sold
                .checked_add(1)
                .ok_or_else(|| StoreError::Integrity(format!("sold count overflow for {id}")))?;
            Ok(ReserveOutcome::Reserved {
                tickets_sold: event.tickets_sold,
                capacity: event.capacity,
            })
        })
    }

    fn release(&self, id: &EventId) -> StoreFuture<'_, bool> {
        let id = id.clone();
        Box::pin(async move {
            let mut tables = self.tables()?;
            match tables.events.get_mut(&id) {
                Some(event) if event.tickets_sold > 0 => {
                    event.tickets_sold -= 1;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }
}

impl TicketStore for InMemoryStore {
    fn insert_ticket(&self, ticket: &Ticket) -> StoreFuture<'_, ()> {
        let ticket = ticket.clone();
        Box::pin(async move {
            let mut tables = self.tables()?;
            if !tables.events.contains_key(&ticket.event_id) {
                return Err(StoreError::Integrity(format!(
                    "event {} does not exist",
                    ticket.event_id
                )));
            }
            if tables.tickets.contains_key(&ticket.id) {
                return Ok(());
            }
            let seq = tables.next_seq;
            tables.next_seq += 1;
            tables.tickets.insert(ticket.id.clone(), (seq, ticket));
            Ok(())
        })
    }

    fn get_ticket(&self, id: &TicketId) -> StoreFuture<'_, Option<TicketWithEvent>> {
        let id = id.clone();
        Box::pin(async move {
            let tables = self.tables()?;
            tables
                .tickets
                .get(&id)
                .map(|(_, ticket)| tables.join(ticket))
                .transpose()
        })
    }

    fn tickets_for_owner(&self, owner: &UserId) -> StoreFuture<'_, Vec<TicketWithEvent>> {
        let owner = owner.clone();
        Box::pin(async move {
            let tables = self.tables()?;
            let mut owned: Vec<&(u64, Ticket)> = tables
                .tickets
                .values()
                .filter(|(_, ticket)| ticket.owner_id.as_ref() == Some(&owner))
                .collect();
            owned.sort_by_key(|(seq, ticket)| Reverse((ticket.created_at, *seq)));
            owned
                .into_iter()
                .map(|(_, ticket)| tables.join(ticket))
                .collect()
        })
    }
}
