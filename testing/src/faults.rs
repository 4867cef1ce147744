//! Store wrappers that inject failures or count calls.
//!
//! Each wrapper forwards to an inner store and keeps its knobs in atomics, so
//! a test can hold an `Arc` to the wrapper, hand a clone to the code under
//! test, and arm or inspect it at any point.

use boxoffice_core::error::StoreError;
use boxoffice_core::store::{EventStore, ReserveOutcome, StoreFuture, TicketStore};
use boxoffice_core::types::{Event, EventFilter, EventId, Ticket, TicketId, TicketWithEvent, UserId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Decrement `counter` if positive; `true` means "fail this call".
fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn injected(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {operation} failure"))
}

/// Ticket store whose writes and reads can be made to fail.
pub struct FlakyTicketStore {
    inner: Arc<dyn TicketStore>,
    failing_inserts: AtomicUsize,
    lost_acks: AtomicUsize,
    failing_fetches: AtomicUsize,
    failing_lookups: AtomicUsize,
    insert_attempts: AtomicUsize,
}

impl FlakyTicketStore {
    /// Wrap `inner`; no failures are armed.
    #[must_use]
    pub fn new(inner: Arc<dyn TicketStore>) -> Self {
        Self {
            inner,
            failing_inserts: AtomicUsize::new(0),
            lost_acks: AtomicUsize::new(0),
            failing_fetches: AtomicUsize::new(0),
            failing_lookups: AtomicUsize::new(0),
            insert_attempts: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` inserts without writing anything.
    pub fn fail_inserts(&self, n: usize) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    /// Write the next `n` inserts but report them as failed, as if the
    /// acknowledgement was lost on the way back.
    pub fn lose_acks(&self, n: usize) {
        self.lost_acks.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` `tickets_for_owner` calls.
    pub fn fail_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` `get_ticket` calls.
    pub fn fail_lookups(&self, n: usize) {
        self.failing_lookups.store(n, Ordering::SeqCst);
    }

    /// Insert calls seen so far, including failed ones.
    #[must_use]
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }
}

impl TicketStore for FlakyTicketStore {
    fn insert_ticket(&self, ticket: &Ticket) -> StoreFuture<'_, ()> {
        let ticket = ticket.clone();
        Box::pin(async move {
            self.insert_attempts.fetch_add(1, Ordering::SeqCst);
            if take(&self.failing_inserts) {
                return Err(injected("insert"));
            }
            self.inner.insert_ticket(&ticket).await?;
            if take(&self.lost_acks) {
                return Err(injected("acknowledgement"));
            }
            Ok(())
        })
    }

    fn get_ticket(&self, id: &TicketId) -> StoreFuture<'_, Option<TicketWithEvent>> {
        if take(&self.failing_lookups) {
            return Box::pin(async { Err(injected("lookup")) });
        }
        self.inner.get_ticket(id)
    }

    fn tickets_for_owner(&self, owner: &UserId) -> StoreFuture<'_, Vec<TicketWithEvent>> {
        if take(&self.failing_fetches) {
            return Box::pin(async { Err(injected("fetch")) });
        }
        self.inner.tickets_for_owner(owner)
    }
}

/// Event store whose releases can be made to fail.
pub struct FlakyEventStore {
    inner: Arc<dyn EventStore>,
    failing_releases: AtomicUsize,
    failing_reserves: AtomicUsize,
}

impl FlakyEventStore {
    /// Wrap `inner`; no failures are armed.
    #[must_use]
    pub fn new(inner: Arc<dyn EventStore>) -> Self {
        Self {
            inner,
            failing_releases: AtomicUsize::new(0),
            failing_reserves: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` releases.
    pub fn fail_releases(&self, n: usize) {
        self.failing_releases.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` reserve attempts before they reach the inner store.
    pub fn fail_reserves(&self, n: usize) {
        self.failing_reserves.store(n, Ordering::SeqCst);
    }
}

impl EventStore for FlakyEventStore {
    fn create_event(&self, event: Event) -> StoreFuture<'_, Event> {
        self.inner.create_event(event)
    }

    fn get_event(&self, id: &EventId) -> StoreFuture<'_, Option<Event>> {
        self.inner.get_event(id)
    }

    fn list_events(&self, filter: &EventFilter) -> StoreFuture<'_, Vec<Event>> {
        self.inner.list_events(filter)
    }

    fn try_reserve(&self, id: &EventId) -> StoreFuture<'_, ReserveOutcome> {
        if take(&self.failing_reserves) {
            return Box::pin(async { Err(injected("reserve")) });
        }
        self.inner.try_reserve(id)
    }

    fn release(&self, id: &EventId) -> StoreFuture<'_, bool> {
        if take(&self.failing_releases) {
            return Box::pin(async { Err(injected("release")) });
        }
        self.inner.release(id)
    }
}

/// Ticket store that counts owner fetches, optionally slowing them down.
pub struct CountingTicketStore {
    inner: Arc<dyn TicketStore>,
    fetches: AtomicUsize,
    fetch_delay: Duration,
}

impl CountingTicketStore {
    /// Wrap `inner` with no added latency.
    #[must_use]
    pub fn new(inner: Arc<dyn TicketStore>) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
            fetch_delay: Duration::ZERO,
        }
    }

    /// Sleep this long before every `tickets_for_owner` call.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// `tickets_for_owner` calls seen so far.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl TicketStore for CountingTicketStore {
    fn insert_ticket(&self, ticket: &Ticket) -> StoreFuture<'_, ()> {
        self.inner.insert_ticket(ticket)
    }

    fn get_ticket(&self, id: &TicketId) -> StoreFuture<'_, Option<TicketWithEvent>> {
        self.inner.get_ticket(id)
    }

    fn tickets_for_owner(&self, owner: &UserId) -> StoreFuture<'_, Vec<TicketWithEvent>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let owner = owner.clone();
        Box::pin(async move {
            if !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            self.inner.tickets_for_owner(&owner).await
        })
    }
}
