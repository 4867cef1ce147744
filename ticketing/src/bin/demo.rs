//! Box office client walkthrough
//!
//! Runs the client-side engine end to end against the in-memory store and
//! the mock identity provider:
//! - Session restore on startup
//! - Sign-up that needs email confirmation, then login
//! - Ticket purchase and the ticket cache catching up
//! - A guest purchase and its share link
//! - Sell-out of a small event
//! - Logout clearing the cache
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin demo
//! ```

use anyhow::Context;
use boxoffice_core::environment::{Clock, SystemClock};
use boxoffice_core::error::PurchaseError;
use boxoffice_core::link::TicketLink;
use boxoffice_core::store::{EventStore, TicketStore};
use boxoffice_core::types::{EventId, Session};
use boxoffice_runtime::cache::TicketCache;
use boxoffice_runtime::issuer::{PurchaseRequest, TicketIssuer};
use boxoffice_runtime::session::SessionManager;
use boxoffice_testing::{InMemoryStore, MockIdentityProvider};
use std::sync::Arc;
use ticketing::seed::seed_demo_events;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BASE_URL: &str = "http://localhost:8080/";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,boxoffice_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("\n============================================");
    println!("   Box Office - Client Walkthrough");
    println!("============================================\n");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryStore::new());
    let seeded = seed_demo_events(store.as_ref(), clock.now()).await?;
    println!("Seeded {seeded} demo events");

    let events: Arc<dyn EventStore> = store.clone();
    let tickets: Arc<dyn TicketStore> = store.clone();
    let issuer = TicketIssuer::new(events, Arc::clone(&tickets), Arc::clone(&clock));

    let provider = Arc::new(MockIdentityProvider::new().requiring_confirmation());
    let sessions = Arc::new(SessionManager::new(provider.clone()));
    let _watch = sessions.watch_provider();
    sessions
        .subscribe(|session: &Session| {
            println!("  [session] -> {}", session.label());
        })
        .detach();
    let cache = TicketCache::attach(&sessions, tickets);

    // ---------------------------------------------------------------
    println!("\n1. Restore");
    let restored = sessions.restore().await;
    println!("   Restored session: {}", restored.label());

    // ---------------------------------------------------------------
    println!("\n2. Sign up (confirmation required)");
    let outcome = sessions.signup("fan@example.com", "stardust42", "Nova").await?;
    println!("   Sign-up outcome: {outcome:?}");
    match sessions.login("fan@example.com", "stardust42").await {
        Ok(_) => println!("   Unexpected: logged in before confirming"),
        Err(err) => println!("   Login before confirming: {err}"),
    }
    provider.confirm("fan@example.com");

    // ---------------------------------------------------------------
    println!("\n3. Login");
    let user = sessions.login("fan@example.com", "stardust42").await?;
    println!(
        "   Signed in as {} ({})",
        user.display_name.as_deref().unwrap_or("anonymous"),
        user.email
    );
    cache.sync().await;
    println!("   Cached tickets after sign-in: {}", cache.entries().len());

    // ---------------------------------------------------------------
    println!("\n4. Purchase");
    let funk = EventId::from_string("event-1");
    let ticket = issuer
        .issue(PurchaseRequest::for_user(funk.clone(), user.email.clone(), user.id.clone()))
        .await?;
    let event = store
        .event(&funk)
        .context("seeded event disappeared")?;
    cache.add_local(ticket.clone(), event.clone());
    println!("   Ticket {} for {}", ticket.id, event.title);
    println!("   Cache now holds {} ticket(s)", cache.entries().len());

    // ---------------------------------------------------------------
    println!("\n5. Guest purchase and share link");
    let jazz = EventId::from_string("event-6");
    let guest = issuer.issue(PurchaseRequest::guest(jazz, "guest@example.com")).await?;
    let link = TicketLink::new(BASE_URL, &guest.id);
    println!("   Guest ticket {} (guest: {})", guest.id, guest.is_guest());
    println!("   Share link / QR payload: {}", link.qr_payload());
    let found = issuer.lookup(&guest.id).await?;
    println!("   Lookup resolves to: {}", found.event.title);

    // ---------------------------------------------------------------
    println!("\n6. Sell-out");
    let food = EventId::from_string("event-4");
    let mut sold = 0;
    loop {
        match issuer.issue(PurchaseRequest::guest(food.clone(), "crowd@example.com")).await {
            Ok(_) => sold += 1,
            Err(err @ PurchaseError::SoldOut(_)) => {
                println!("   Sold {sold} tickets, then: {} [{}]", err.user_message(), err.code());
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    // ---------------------------------------------------------------
    println!("\n7. Logout");
    sessions.logout().await?;
    cache.sync().await;
    println!("   Cached tickets after logout: {}", cache.entries().len());

    println!("\nTotal tickets issued: {}", store.ticket_count());
    Ok(())
}
