//! Box office storefront service.
//!
//! HTTP surface over the ticket-issuance engine in `boxoffice-runtime`:
//!
//! - **Catalogue**: browse events by search and category, create events
//!   behind an admin key
//! - **Purchases**: one atomic reservation plus one ticket write per request,
//!   compensated if the write fails
//! - **Tickets**: lookup by id with a shareable link, listings per identity
//!
//! # Architecture
//!
//! ```text
//!  HTTP (axum) ──► AppState ──► TicketIssuer ──► InventoryLedger ──► EventStore
//!                      │              └──────────────────────────► TicketStore
//!                      └──────► EventCatalog ─────────────────────► EventStore
//! ```
//!
//! Both stores are backed by either `InMemoryStore` or `PostgresStore`,
//! selected by `STORAGE_BACKEND`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod seed;
pub mod server;

pub use config::Config;
pub use server::{AppState, build_router};
