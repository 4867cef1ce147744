//! Ticket issuance integration tests.
//!
//! Covers the capacity guarantees under concurrent purchases, guest and
//! authenticated purchases, lookups, and the compensation path when the
//! ticket write fails.
//!
//! Run with: `cargo test -p boxoffice-runtime --test issuance_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use boxoffice_core::error::{LookupError, PurchaseError, StoreError, ValidationError};
use boxoffice_core::store::{EventStore, TicketStore};
use boxoffice_core::types::{EventId, TicketId, UserId};
use boxoffice_runtime::issuer::{PurchaseRequest, TicketIssuer};
use boxoffice_runtime::retry::RetryPolicy;
use boxoffice_testing::fixtures::event_with_capacity;
use boxoffice_testing::helpers::init_test_tracing;
use boxoffice_testing::{FlakyEventStore, FlakyTicketStore, InMemoryStore, test_clock};
use futures::future::join_all;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn issuer_for(store: &Arc<InMemoryStore>) -> TicketIssuer {
    let events: Arc<dyn EventStore> = store.clone();
    let tickets: Arc<dyn TicketStore> = store.clone();
    TicketIssuer::new(events, tickets, Arc::new(test_clock()))
}

fn fast_retries(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .build()
}

async fn purchase_concurrently(
    issuer: &TicketIssuer,
    event_id: &EventId,
    requests: usize,
) -> Vec<Result<boxoffice_core::types::Ticket, PurchaseError>> {
    let handles = (0..requests).map(|i| {
        let issuer = issuer.clone();
        let request = PurchaseRequest::guest(event_id.clone(), format!("fan{i}@example.com"));
        tokio::spawn(async move { issuer.issue(request).await })
    });

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("purchase task panicked"))
        .collect()
}

/// Two simultaneous purchases of the last seat: exactly one wins.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_seat_race() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("E1", Some(1)));
    let issuer = issuer_for(&store);

    let results = purchase_concurrently(&issuer, &event.id, 2).await;

    let issued = results.iter().filter(|r| r.is_ok()).count();
    let sold_out = results
        .iter()
        .filter(|r| matches!(r, Err(PurchaseError::SoldOut(_))))
        .count();
    assert_eq!(issued, 1);
    assert_eq!(sold_out, 1);
    assert_eq!(store.tickets_sold(&event.id), Some(1));
    assert_eq!(store.ticket_count_for(&event.id), 1);
}

/// N >= C concurrent purchases yield exactly C tickets and N - C sold-outs.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_no_oversell_under_load() {
    const CAPACITY: u32 = 25;
    const REQUESTS: usize = 200;
    init_test_tracing();

    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Cosmic Funk Fest", Some(CAPACITY)));
    let issuer = issuer_for(&store);

    let results = purchase_concurrently(&issuer, &event.id, REQUESTS).await;

    let issued = results.iter().filter(|r| r.is_ok()).count();
    let sold_out = results
        .iter()
        .filter(|r| matches!(r, Err(PurchaseError::SoldOut(_))))
        .count();
    assert_eq!(issued, CAPACITY as usize);
    assert_eq!(sold_out, REQUESTS - CAPACITY as usize);
    assert_eq!(store.tickets_sold(&event.id), Some(CAPACITY));
    assert_eq!(store.ticket_count_for(&event.id), CAPACITY as usize);
}

/// Events without a capacity never sell out and count every sale.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unlimited_capacity_counts_every_sale() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Open Air", None));
    let issuer = issuer_for(&store);

    let results = purchase_concurrently(&issuer, &event.id, 150).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(store.tickets_sold(&event.id), Some(150));
    assert_eq!(store.ticket_count_for(&event.id), 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ticket_ids_are_unique() {
    let store = Arc::new(InMemoryStore::new());
    let first = store.seed_event(event_with_capacity("A", None));
    let second = store.seed_event(event_with_capacity("B", Some(40)));
    let issuer = issuer_for(&store);

    let mut results = purchase_concurrently(&issuer, &first.id, 60).await;
    results.extend(purchase_concurrently(&issuer, &second.id, 60).await);

    let ids: Vec<TicketId> = results.into_iter().filter_map(Result::ok).map(|t| t.id).collect();
    let unique: HashSet<_> = ids.iter().cloned().collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(unique.len(), ids.len());
}

#[tokio::test]
async fn test_lookup_round_trip() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Nebula Nights", Some(5)));
    let issuer = issuer_for(&store);
    let owner = UserId::new();

    let ticket = issuer
        .issue(PurchaseRequest::for_user(event.id.clone(), "ada@example.com", owner.clone()))
        .await
        .unwrap();
    let found = issuer.lookup(&ticket.id).await.unwrap();

    assert_eq!(found.ticket, ticket);
    assert_eq!(found.event.id, event.id);
    assert_eq!(found.event.tickets_sold, 1);
    assert_eq!(ticket.owner_id, Some(owner));
    assert_eq!(ticket.created_at, boxoffice_core::environment::Clock::now(&test_clock()));
}

#[tokio::test]
async fn test_guest_purchase_has_no_owner() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Walk-in Gig", Some(3)));
    let issuer = issuer_for(&store);

    let ticket = issuer
        .issue(PurchaseRequest::guest(event.id.clone(), "  guest@example.com "))
        .await
        .unwrap();

    assert!(ticket.is_guest());
    assert_eq!(ticket.owner_email.as_str(), "guest@example.com");
    assert_eq!(issuer.lookup(&ticket.id).await.unwrap().ticket, ticket);
    assert_eq!(store.tickets_sold(&event.id), Some(1));
}

#[tokio::test]
async fn test_missing_event_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let issuer = issuer_for(&store);

    let err = issuer
        .issue(PurchaseRequest::guest(EventId::from_string("missing-event"), "a@b.com"))
        .await
        .unwrap_err();

    assert_eq!(err, PurchaseError::EventNotFound(EventId::from_string("missing-event")));
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn test_unknown_ticket_lookup_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let issuer = issuer_for(&store);
    let id = TicketId::from_string("nonexistent-ticket-id");

    assert_eq!(issuer.lookup(&id).await.unwrap_err(), LookupError::NotFound(id));
}

#[tokio::test]
async fn test_invalid_email_reserves_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(1)));
    let issuer = issuer_for(&store);

    let err = issuer
        .issue(PurchaseRequest::guest(event.id.clone(), "not-an-email"))
        .await
        .unwrap_err();

    assert!(matches!(err, PurchaseError::Validation(ValidationError::InvalidEmail { .. })));
    assert_eq!(err.user_message(), "Invalid email");
    assert_eq!(store.tickets_sold(&event.id), Some(0));
}

#[tokio::test]
async fn test_blank_owner_id_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(1)));
    let issuer = issuer_for(&store);

    let err = issuer
        .issue(PurchaseRequest::for_user(event.id.clone(), "a@b.com", UserId::from_string("  ")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PurchaseError::Validation(ValidationError::Invalid { field: "owner_id", .. })
    ));
    assert_eq!(store.tickets_sold(&event.id), Some(0));
}

#[tokio::test]
async fn test_sold_out_message() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(1)));
    let issuer = issuer_for(&store);
    assert_ok!(issuer.issue(PurchaseRequest::guest(event.id.clone(), "first@b.com")).await);

    let err = assert_err!(issuer.issue(PurchaseRequest::guest(event.id.clone(), "a@b.com")).await);

    assert_eq!(err.code(), "SOLD_OUT");
    assert_eq!(err.user_message(), "Sold Out");
}

/// A write that keeps failing releases the reserved unit.
#[tokio::test]
async fn test_failed_write_releases_reservation() {
    init_test_tracing();
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(1)));
    let flaky = Arc::new(FlakyTicketStore::new(store.clone()));
    flaky.fail_inserts(10);

    let issuer = TicketIssuer::new(store.clone(), flaky.clone(), Arc::new(test_clock()))
        .with_retry_policy(fast_retries(2));

    let err = issuer
        .issue(PurchaseRequest::guest(event.id.clone(), "a@b.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, PurchaseError::Store(StoreError::Unavailable(_))));
    assert_eq!(flaky.insert_attempts(), 3);
    assert_eq!(store.tickets_sold(&event.id), Some(0));
    assert_eq!(store.ticket_count(), 0);

    // The released seat is purchasable again.
    flaky.fail_inserts(0);
    assert_ok!(issuer.issue(PurchaseRequest::guest(event.id.clone(), "b@c.com")).await);
    assert_eq!(store.tickets_sold(&event.id), Some(1));
}

/// A transient write failure is retried with the same ticket id.
#[tokio::test]
async fn test_transient_write_failure_is_retried() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(2)));
    let flaky = Arc::new(FlakyTicketStore::new(store.clone()));
    flaky.fail_inserts(2);

    let issuer = TicketIssuer::new(store.clone(), flaky.clone(), Arc::new(test_clock()))
        .with_retry_policy(fast_retries(3));

    let ticket = issuer
        .issue(PurchaseRequest::guest(event.id.clone(), "a@b.com"))
        .await
        .unwrap();

    assert_eq!(flaky.insert_attempts(), 3);
    assert_eq!(store.tickets_sold(&event.id), Some(1));
    assert_eq!(issuer.lookup(&ticket.id).await.unwrap().ticket, ticket);
}

/// A lost acknowledgement does not produce a second ticket.
#[tokio::test]
async fn test_lost_ack_does_not_duplicate_ticket() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(5)));
    let flaky = Arc::new(FlakyTicketStore::new(store.clone()));
    flaky.lose_acks(1);

    let issuer = TicketIssuer::new(store.clone(), flaky.clone(), Arc::new(test_clock()))
        .with_retry_policy(fast_retries(2));

    issuer
        .issue(PurchaseRequest::guest(event.id.clone(), "a@b.com"))
        .await
        .unwrap();

    assert_eq!(flaky.insert_attempts(), 2);
    assert_eq!(store.ticket_count_for(&event.id), 1);
    assert_eq!(store.tickets_sold(&event.id), Some(1));
}

/// Every acknowledgement lost: the read-back finds the ticket, so the unit
/// stays sold and the seat cannot be sold twice.
#[tokio::test]
async fn test_lost_acks_on_every_attempt_keep_the_sale() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(1)));
    let flaky = Arc::new(FlakyTicketStore::new(store.clone()));
    flaky.lose_acks(3);

    let issuer = TicketIssuer::new(store.clone(), flaky.clone(), Arc::new(test_clock()))
        .with_retry_policy(fast_retries(2));

    let ticket = assert_ok!(issuer.issue(PurchaseRequest::guest(event.id.clone(), "a@b.com")).await);

    assert_eq!(flaky.insert_attempts(), 3);
    assert_eq!(store.tickets_sold(&event.id), Some(1));
    assert_eq!(store.ticket_count_for(&event.id), 1);
    assert_eq!(issuer.lookup(&ticket.id).await.unwrap().ticket, ticket);

    flaky.lose_acks(0);
    let err = assert_err!(issuer.issue(PurchaseRequest::guest(event.id.clone(), "b@c.com")).await);
    assert!(matches!(err, PurchaseError::SoldOut(_)));
    assert_eq!(store.ticket_count_for(&event.id), 1);
}

/// When the ticket cannot be read back, the unit is kept rather than risk
/// freeing a seat whose ticket exists.
#[tokio::test]
async fn test_unverifiable_write_keeps_reservation() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(1)));
    let flaky = Arc::new(FlakyTicketStore::new(store.clone()));
    flaky.fail_inserts(10);
    flaky.fail_lookups(10);

    let issuer = TicketIssuer::new(store.clone(), flaky.clone(), Arc::new(test_clock()))
        .with_retry_policy(fast_retries(1));

    let err = assert_err!(issuer.issue(PurchaseRequest::guest(event.id.clone(), "a@b.com")).await);

    assert_eq!(err.code(), "STORE_FAILURE");
    assert_eq!(store.tickets_sold(&event.id), Some(1));
    assert_eq!(store.ticket_count(), 0);
}

/// Release failures are retried too.
#[tokio::test]
async fn test_compensation_retries_release() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(1)));
    let events = Arc::new(FlakyEventStore::new(store.clone()));
    let tickets = Arc::new(FlakyTicketStore::new(store.clone()));
    tickets.fail_inserts(10);
    events.fail_releases(1);

    let issuer = TicketIssuer::new(events, tickets, Arc::new(test_clock()))
        .with_retry_policy(fast_retries(2));

    let err = issuer
        .issue(PurchaseRequest::guest(event.id.clone(), "a@b.com"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "STORE_FAILURE");
    assert_eq!(store.tickets_sold(&event.id), Some(0));
}

#[tokio::test]
async fn test_reserve_store_failure_is_store_error() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", Some(1)));
    let events = Arc::new(FlakyEventStore::new(store.clone()));
    events.fail_reserves(1);

    let issuer = TicketIssuer::new(events, store.clone(), Arc::new(test_clock()));

    let err = issuer
        .issue(PurchaseRequest::guest(event.id.clone(), "a@b.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, PurchaseError::Store(_)));
    assert_eq!(store.tickets_sold(&event.id), Some(0));
    assert_eq!(store.ticket_count(), 0);
}

#[tokio::test]
async fn test_tickets_for_owner_newest_first() {
    let store = Arc::new(InMemoryStore::new());
    let event = store.seed_event(event_with_capacity("Gig", None));
    let issuer = issuer_for(&store);
    let owner = UserId::new();

    let mut issued = Vec::new();
    for _ in 0..3 {
        issued.push(
            issuer
                .issue(PurchaseRequest::for_user(event.id.clone(), "ada@example.com", owner.clone()))
                .await
                .unwrap(),
        );
    }
    issuer
        .issue(PurchaseRequest::guest(event.id.clone(), "ada@example.com"))
        .await
        .unwrap();

    let owned = issuer.tickets_for_owner(&owner).await.unwrap();
    let ids: Vec<_> = owned.into_iter().map(|entry| entry.ticket.id).collect();
    let expected: Vec<_> = issued.into_iter().rev().map(|ticket| ticket.id).collect();
    assert_eq!(ids, expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_concurrent_purchases_never_oversell(
        (capacity, demand) in boxoffice_testing::properties::capacity_and_demand()
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .build()
            .unwrap();

        let (issued, sold) = runtime.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let event = store.seed_event(event_with_capacity("Prop Gig", Some(capacity)));
            let issuer = issuer_for(&store);
            let results = purchase_concurrently(&issuer, &event.id, demand).await;
            (
                results.iter().filter(|r| r.is_ok()).count(),
                store.tickets_sold(&event.id).unwrap(),
            )
        });

        prop_assert_eq!(issued, capacity as usize);
        prop_assert_eq!(sold, capacity);
    }
}
