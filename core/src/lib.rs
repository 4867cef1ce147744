//! # Box Office Core
//!
//! Core types and traits for the box office ticket-issuance engine.
//!
//! This crate holds everything the engine's components agree on without
//! depending on each other:
//!
//! - **Types**: events, tickets, users, sessions and validated value objects
//! - **Errors**: the explicit result taxonomy every operation returns
//! - **Stores**: traits over the shared backing store, including the atomic
//!   reserve-one-unit operation
//! - **Identity**: the contract with the external identity provider
//! - **Environment**: injected dependencies such as the clock
//!
//! The components themselves (ledger, issuer, session manager, ticket cache)
//! live in `boxoffice-runtime`.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod error;
pub mod identity;
pub mod link;
pub mod store;
pub mod types;

/// Environment module - Dependency injection traits
///
/// External dependencies the engine needs beyond the stores are abstracted
/// behind traits here and injected at construction time.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use boxoffice_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use error::{AuthError, LookupError, PurchaseError, ReserveError, StoreError, ValidationError};
pub use identity::{IdentityChange, IdentityProvider, IdentitySession, SignUpOutcome};
pub use link::TicketLink;
pub use store::{EventStore, ReserveOutcome, TicketStore};
pub use types::{
    Capacity, Email, Event, EventFilter, EventId, Money, NewEvent, Session, Ticket, TicketId,
    TicketWithEvent, User, UserId,
};
