//! API endpoints for the storefront.
//!
//! Handlers are organized by resource:
//! - Events: browsing and admin creation
//! - Purchases: ticket issuance
//! - Tickets: lookup and per-owner listings

pub mod error;
pub mod events;
pub mod purchases;
pub mod tickets;

pub use error::{AppError, ErrorBody};
pub use events::{create_event, get_event, list_categories, list_events};
pub use purchases::create_purchase;
pub use tickets::{get_ticket, list_owner_tickets};
