//! Event catalogue: admin creation and storefront browsing.

use boxoffice_core::environment::Clock;
use boxoffice_core::error::{StoreError, ValidationError};
use boxoffice_core::store::EventStore;
use boxoffice_core::types::{Event, EventFilter, EventId, NewEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Failed catalogue operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Admin input was incomplete.
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    /// No event with this id.
    #[error("Event {0} not found")]
    NotFound(EventId),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates and lists events.
#[derive(Clone)]
pub struct EventCatalog {
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl EventCatalog {
    /// Create a catalogue over the shared event store.
    #[must_use]
    pub fn new(events: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { events, clock }
    }

    /// Validate admin input and persist a new event with nothing sold.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Validation`] for a blank required field,
    /// [`CatalogError::Store`] if the write failed.
    #[tracing::instrument(skip(self, new), fields(title = %new.title))]
    pub async fn create(&self, new: NewEvent) -> Result<Event, CatalogError> {
        let new = new.validate()?;
        let event = Event::from_new(EventId::new(), new, self.clock.now());
        let event = self.events.create_event(event).await?;
        info!(event_id = %event.id, capacity = ?event.capacity, "Event created");
        Ok(event)
    }

    /// Load one event.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] for an unknown id, [`CatalogError::Store`]
    /// if the read failed.
    pub async fn get(&self, id: &EventId) -> Result<Event, CatalogError> {
        self.events
            .get_event(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
    }

    /// Events matching `filter`, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read failed.
    pub async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        self.events.list_events(filter).await
    }

    /// Distinct categories across all events, alphabetical.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read failed.
    pub async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let events = self.events.list_events(&EventFilter::default()).await?;
        Ok(events
            .into_iter()
            .map(|event| event.category)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }
}
