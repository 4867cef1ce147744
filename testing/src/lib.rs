//! # Box Office Testing
//!
//! Testing utilities for the box office engine.
//!
//! This crate provides:
//! - [`InMemoryStore`]: event and ticket storage with the same atomic
//!   reservation semantics as the Postgres store
//! - Fault-injecting and counting store wrappers
//! - [`MockIdentityProvider`]: scriptable accounts and sessions
//! - Deterministic clocks, fixtures and proptest strategies
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::{InMemoryStore, fixtures, test_clock};
//! use boxoffice_runtime::issuer::{PurchaseRequest, TicketIssuer};
//!
//! #[tokio::test]
//! async fn test_guest_purchase() {
//!     let store = Arc::new(InMemoryStore::new());
//!     let event = store.seed_event(fixtures::event_with_capacity("Gig", Some(10)));
//!     let issuer = TicketIssuer::new(store.clone(), store.clone(), Arc::new(test_clock()));
//!
//!     let ticket = issuer.issue(PurchaseRequest::guest(event.id, "a@b.com")).await?;
//!     assert!(ticket.is_guest());
//! }
//! ```

use chrono::{DateTime, Utc};
use boxoffice_core::environment::Clock;

pub mod faults;
pub mod fixtures;
pub mod identity;
pub mod store;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time until moved with [`FixedClock::advance`].
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2);
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut time) = self.time.lock() {
                *time += by;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities.
pub mod helpers {
    /// Install a `fmt` subscriber honouring `RUST_LOG`, once per process.
    ///
    /// Safe to call from every test; later calls are no-ops.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Plausible email addresses.
    pub fn valid_email() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9._+]{0,15}", "[a-z][a-z0-9-]{0,9}[a-z0-9]", "[a-z]{2,6}")
            .prop_map(|(local, domain, tld)| format!("{local}@{domain}.{tld}"))
    }

    /// Strings that are not valid email addresses.
    pub fn invalid_email() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,12}",
            "[a-z]{1,8}@",
            "@[a-z]{1,8}\\.com",
            "[a-z]{1,8}@[a-z]{1,8}",
            "[a-z]{1,5} [a-z]{1,5}@[a-z]{1,8}\\.com",
            "[a-z]{1,5}@@[a-z]{1,8}\\.com",
        ]
    }

    /// Small capacities paired with a demand at least as large.
    pub fn capacity_and_demand() -> impl Strategy<Value = (u32, usize)> {
        (1u32..12).prop_flat_map(|capacity| {
            let capacity_usize = usize::try_from(capacity).unwrap_or(usize::MAX);
            (Just(capacity), capacity_usize..capacity_usize + 12)
        })
    }
}

// Re-export commonly used items
pub use faults::{CountingTicketStore, FlakyEventStore, FlakyTicketStore};
pub use identity::MockIdentityProvider;
pub use mocks::{FixedClock, test_clock};
pub use store::InMemoryStore;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);

        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now() - time1, chrono::Duration::minutes(5));
    }

    proptest! {
        #[test]
        fn prop_valid_emails_parse(raw in properties::valid_email()) {
            prop_assert!(boxoffice_core::types::Email::parse(&raw).is_ok());
        }

        #[test]
        fn prop_invalid_emails_rejected(raw in properties::invalid_email()) {
            prop_assert!(boxoffice_core::types::Email::parse(&raw).is_err());
        }
    }
}
