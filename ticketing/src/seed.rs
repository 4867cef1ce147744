//! Demo catalogue.
//!
//! Six events with stable ids (`event-1` .. `event-6`) so links and scripts
//! can refer to them. Dates are relative to startup so the catalogue never
//! goes stale.

use boxoffice_core::error::StoreError;
use boxoffice_core::store::EventStore;
use boxoffice_core::types::{Capacity, Event, EventId, Money};
use chrono::{DateTime, Duration, NaiveTime, Utc};

struct DemoEvent {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    days_out: i64,
    hour: i64,
    location: &'static str,
    image_seed: &'static str,
    category: &'static str,
    price_cents: u64,
    organizer: &'static str,
    tags: &'static [&'static str],
    capacity: Option<u32>,
}

const DEMO_EVENTS: &[DemoEvent] = &[
    DemoEvent {
        id: "event-1",
        title: "Cosmic Funk Fest",
        description: "An interstellar journey through funk, soul, and disco. Featuring live bands and DJs from across the galaxy.",
        days_out: 14,
        hour: 20,
        location: "Orion Nebula Amphitheater",
        image_seed: "cosmic",
        category: "Music",
        price_cents: 7_500,
        organizer: "Galactic Grooves Inc.",
        tags: &["funk", "disco", "live"],
        capacity: Some(5_000),
    },
    DemoEvent {
        id: "event-2",
        title: "React Universe Conf",
        description: "The biggest React conference in the universe. Learn about the latest features, server components, and hooks from the creators.",
        days_out: 45,
        hour: 9,
        location: "Virtual, accessible via Holo-Deck",
        image_seed: "react",
        category: "Tech",
        price_cents: 29_900,
        organizer: "Future Forward",
        tags: &["conference", "web"],
        capacity: None,
    },
    DemoEvent {
        id: "event-3",
        title: "Midnight Art Gala",
        description: "An exclusive night showcasing avant-garde digital art and sculptures. Dress code: futuristic formal.",
        days_out: 60,
        hour: 19,
        location: "The Void Gallery",
        image_seed: "artgala",
        category: "Art",
        price_cents: 15_000,
        organizer: "Void Collective",
        tags: &["art", "gala"],
        capacity: Some(200),
    },
    DemoEvent {
        id: "event-4",
        title: "Gourmet Galaxy Food Tour",
        description: "Taste the finest cuisines from a dozen different star systems. A culinary experience you will never forget.",
        days_out: 27,
        hour: 18,
        location: "Titan City Food Market",
        image_seed: "food",
        category: "Food",
        price_cents: 20_000,
        organizer: "Titan Tastings",
        tags: &["food", "tour"],
        capacity: Some(80),
    },
    DemoEvent {
        id: "event-5",
        title: "Cyber-Punk Marathon",
        description: "Run through the neon-lit streets of Neo-Kyoto in this thrilling 42km marathon. Cybernetic enhancements are encouraged.",
        days_out: 90,
        hour: 7,
        location: "Neo-Kyoto, Sector 7",
        image_seed: "marathon",
        category: "Sports",
        price_cents: 5_000,
        organizer: "Neon Runners Club",
        tags: &["running", "outdoor"],
        capacity: Some(1_000),
    },
    DemoEvent {
        id: "event-6",
        title: "Deep Space Jazz Night",
        description: "Relax and unwind to the smooth sounds of live jazz under a simulated starfield. Classic cocktails served.",
        days_out: 35,
        hour: 21,
        location: "The Blue Comet Lounge",
        image_seed: "jazz",
        category: "Music",
        price_cents: 6_000,
        organizer: "Blue Comet Lounge",
        tags: &["jazz", "cocktails"],
        capacity: Some(150),
    },
];

/// The demo catalogue as of `now`.
#[must_use]
pub fn demo_events(now: DateTime<Utc>) -> Vec<Event> {
    let midnight = now.date_naive().and_time(NaiveTime::default()).and_utc();
    DEMO_EVENTS
        .iter()
        .map(|demo| Event {
            id: EventId::from_string(demo.id),
            title: demo.title.to_string(),
            description: demo.description.to_string(),
            date: midnight + Duration::days(demo.days_out) + Duration::hours(demo.hour),
            location: demo.location.to_string(),
            image_url: format!("https://picsum.photos/seed/{}/1600/900", demo.image_seed),
            category: demo.category.to_string(),
            price: Money::from_cents(demo.price_cents),
            organizer: demo.organizer.to_string(),
            tags: demo.tags.iter().map(ToString::to_string).collect(),
            capacity: demo.capacity.map(Capacity::new),
            tickets_sold: 0,
            created_at: now,
        })
        .collect()
}

/// Insert any demo events that are not stored yet.
///
/// Returns how many were inserted.
///
/// # Errors
///
/// Returns [`StoreError`] if a read or write fails.
pub async fn seed_demo_events(events: &dyn EventStore, now: DateTime<Utc>) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for event in demo_events(now) {
        if events.get_event(&event.id).await?.is_some() {
            continue;
        }
        tracing::debug!(event_id = %event.id, title = %event.title, "Seeding demo event");
        events.create_event(event).await?;
        inserted += 1;
    }
    tracing::info!(inserted, "Demo catalogue seeded");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalogue_is_stable() {
        let now = Utc::now();
        let events = demo_events(now);
        assert_eq!(events.len(), 6);
        assert_eq!(events[0].id.as_str(), "event-1");
        assert_eq!(events[5].title, "Deep Space Jazz Night");
        assert!(events.iter().all(|event| event.date > now && event.tickets_sold == 0));
    }
}
