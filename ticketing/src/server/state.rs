//! Application state for the ticketing HTTP server.
//!
//! Everything handlers need, cloned cheaply (via `Arc`) per request:
//! - Ticket issuer (purchases, lookups, per-owner listings)
//! - Event catalogue (browsing and admin creation)
//! - Storefront settings (share-link base URL, admin key)
//! - The database handle, when running on Postgres, for readiness checks

use crate::config::StorefrontConfig;
use boxoffice_core::environment::Clock;
use boxoffice_core::link::TicketLink;
use boxoffice_core::store::{EventStore, TicketStore};
use boxoffice_core::types::TicketId;
use boxoffice_postgres::PostgresStore;
use boxoffice_runtime::catalog::EventCatalog;
use boxoffice_runtime::issuer::TicketIssuer;
use boxoffice_runtime::retry::RetryPolicy;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Issues and resolves tickets
    pub issuer: Arc<TicketIssuer>,
    /// Event browsing and administration
    pub catalog: Arc<EventCatalog>,
    /// Storefront settings
    pub storefront: Arc<StorefrontConfig>,
    /// Present when the backing store is Postgres
    pub database: Option<PostgresStore>,
}

impl AppState {
    /// Wire the engine over one backing store.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventStore>,
        tickets: Arc<dyn TicketStore>,
        clock: Arc<dyn Clock>,
        storefront: StorefrontConfig,
        retry: RetryPolicy,
    ) -> Self {
        let issuer = TicketIssuer::new(Arc::clone(&events), tickets, Arc::clone(&clock))
            .with_retry_policy(retry);
        Self {
            issuer: Arc::new(issuer),
            catalog: Arc::new(EventCatalog::new(events, clock)),
            storefront: Arc::new(storefront),
            database: None,
        }
    }

    /// Attach the Postgres handle used by `/ready`.
    #[must_use]
    pub fn with_database(mut self, database: PostgresStore) -> Self {
        self.database = Some(database);
        self
    }

    /// Shareable link (and QR payload) for a ticket.
    #[must_use]
    pub fn share_link(&self, ticket_id: &TicketId) -> TicketLink {
        TicketLink::new(&self.storefront.public_base_url, ticket_id)
    }
}
