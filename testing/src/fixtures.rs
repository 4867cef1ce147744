//! Ready-made events, tickets and users for tests.

use crate::mocks::test_clock;
use boxoffice_core::environment::Clock;
use boxoffice_core::types::{
    Capacity, Email, Event, EventId, Money, NewEvent, Ticket, TicketId, User, UserId,
};
use chrono::Duration;

/// Admin input for an event a month after the test clock's "now".
#[must_use]
pub fn new_event(title: &str, capacity: Option<u32>) -> NewEvent {
    NewEvent {
        title: title.to_string(),
        description: format!("{title}, live."),
        date: test_clock().now() + Duration::days(30),
        location: "Orion Nebula Amphitheater".to_string(),
        image_url: String::new(),
        category: "Music".to_string(),
        price: Money::from_cents(7_500),
        organizer: "Galactic Grooves Inc.".to_string(),
        tags: vec!["live".to_string()],
        capacity: capacity.map(Capacity::new),
    }
}

/// A stored event with nothing sold yet.
#[must_use]
pub fn event_with_capacity(title: &str, capacity: Option<u32>) -> Event {
    let new = new_event(title, capacity);
    Event {
        id: EventId::new(),
        title: new.title,
        description: new.description,
        date: new.date,
        location: new.location,
        image_url: format!("https://picsum.photos/seed/{}/1600/900", title.len()),
        category: new.category,
        price: new.price,
        organizer: new.organizer,
        tags: new.tags,
        capacity: new.capacity,
        tickets_sold: 0,
        created_at: test_clock().now(),
    }
}

/// A ticket for `event`, issued "now" by the test clock.
///
/// # Panics
///
/// Never in practice: the hardcoded email is valid.
#[must_use]
#[allow(clippy::expect_used)]
pub fn ticket_for(event: &Event, owner_id: Option<UserId>) -> Ticket {
    Ticket {
        id: TicketId::new(),
        event_id: event.id.clone(),
        owner_id,
        owner_email: Email::parse("fan@example.com").expect("hardcoded email should parse"),
        created_at: test_clock().now(),
    }
}

/// A signed-in user.
#[must_use]
pub fn user(email: &str, display_name: Option<&str>) -> User {
    User {
        id: UserId::new(),
        email: email.to_string(),
        display_name: display_name.map(ToString::to_string),
        is_admin: false,
    }
}
