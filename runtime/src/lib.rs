//! # Box Office Runtime
//!
//! The components of the ticket-issuance engine, built on the types and
//! store traits from `boxoffice-core`.
//!
//! ## Core Components
//!
//! - **Inventory Ledger**: atomically reserves event capacity
//! - **Ticket Issuer**: reserve, persist, compensate on failure
//! - **Event Catalog**: admin event creation and storefront browsing
//! - **Session Manager**: ordered identity state with an observer list
//! - **Ticket Cache**: the signed-in user's tickets, reconciled on every
//!   session change
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_runtime::issuer::{PurchaseRequest, TicketIssuer};
//!
//! let issuer = TicketIssuer::new(events, tickets, clock);
//! let ticket = issuer
//!     .issue(PurchaseRequest::guest(event_id, "fan@example.com"))
//!     .await?;
//! let found = issuer.lookup(&ticket.id).await?;
//! ```

/// Ticket cache for the signed-in user
pub mod cache;

/// Event catalogue
pub mod catalog;

/// Ticket issuance
pub mod issuer;

/// Capacity reservation
pub mod ledger;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

/// Identity state machine
pub mod session;

pub use cache::{CacheSnapshot, TicketCache};
pub use catalog::{CatalogError, EventCatalog};
pub use issuer::{PurchaseRequest, TicketIssuer};
pub use ledger::{InventoryLedger, Reservation};
pub use retry::RetryPolicy;
pub use session::{SessionManager, SessionSubscription};
