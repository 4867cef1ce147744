//! Domain types for the box office.
//!
//! Identifiers, validated value objects (`Email`, `Capacity`, `Money`) and the
//! records the engine moves around: events, tickets, users and sessions.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event.
///
/// Opaque to the engine: ids minted here are UUIDv4 strings, but ids coming
/// from callers are accepted verbatim and simply fail to resolve if unknown.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ticket
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity reference issued by the identity provider
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Maximum length of an email address (RFC 5321 path limit).
const MAX_EMAIL_LEN: usize = 254;

/// Maximum length of the local part of an email address.
const MAX_LOCAL_PART_LEN: usize = 64;

/// A syntactically plausible email address.
///
/// Only constructed through [`Email::parse`], so every `Email` in the system
/// has passed validation. Surrounding whitespace is trimmed; case is kept.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Validate and wrap an email address.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] for a blank input and
    /// [`ValidationError::InvalidEmail`] when the address is malformed.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ValidationError::Required { field: "email" });
        }

        let invalid = || ValidationError::InvalidEmail {
            value: value.to_string(),
        };

        if value.len() > MAX_EMAIL_LEN || value.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || local.len() > MAX_LOCAL_PART_LEN || domain.contains('@') {
            return Err(invalid());
        }

        let labels: Vec<&str> = domain.split('.').collect();
        let domain_ok = labels.len() >= 2
            && labels.iter().all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_alphanumeric() || c == '-')
            });
        if !domain_ok {
            return Err(invalid());
        }

        Ok(Self(value.to_string()))
    }

    /// Borrow the address
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of tickets an event may issue
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capacity(pub u32);

impl Capacity {
    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount in dollars (rounded down)
    #[must_use]
    pub const fn dollars(&self) -> u64 {
        self.0 / 100
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.dollars(), self.0 % 100)
    }
}

// ============================================================================
// Events
// ============================================================================

/// A ticketed event (concert, conference, tour, ...).
///
/// Only `id`, `capacity` and `tickets_sold` matter to the issuance engine; the
/// rest is catalogue data carried along for the storefront.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier
    pub id: EventId,
    /// Event title
    pub title: String,
    /// Long-form description
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Venue or address
    pub location: String,
    /// Hero image
    pub image_url: String,
    /// Category used for browsing ("Music", "Tech", ...)
    pub category: String,
    /// Ticket price
    pub price: Money,
    /// Organizer name
    pub organizer: String,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Ticket limit; `None` means unlimited
    pub capacity: Option<Capacity>,
    /// Tickets issued so far. Only the inventory ledger changes this.
    pub tickets_sold: u32,
    /// When the event record was created
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Build a fresh event from validated admin input.
    #[must_use]
    pub fn from_new(id: EventId, new: NewEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            description: new.description,
            date: new.date,
            location: new.location,
            image_url: new.image_url,
            category: new.category,
            price: new.price,
            organizer: new.organizer,
            tags: new.tags,
            capacity: new.capacity,
            tickets_sold: 0,
            created_at,
        }
    }

    /// Tickets still available, or `None` when capacity is unlimited.
    #[must_use]
    pub fn tickets_remaining(&self) -> Option<u32> {
        self.capacity
            .map(|capacity| capacity.value().saturating_sub(self.tickets_sold))
    }

    /// Whether a capacity-limited event has issued all of its tickets.
    #[must_use]
    pub fn is_sold_out(&self) -> bool {
        self.tickets_remaining() == Some(0)
    }
}

/// Admin input for creating an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Event title
    pub title: String,
    /// Long-form description
    #[serde(default)]
    pub description: String,
    /// When the event takes place
    pub date: DateTime<Utc>,
    /// Venue or address
    pub location: String,
    /// Hero image; a placeholder is derived from the title when blank
    #[serde(default)]
    pub image_url: String,
    /// Category
    pub category: String,
    /// Ticket price
    pub price: Money,
    /// Organizer name
    pub organizer: String,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ticket limit; `None` means unlimited
    #[serde(default)]
    pub capacity: Option<Capacity>,
}

impl NewEvent {
    /// Check required fields and normalize the input.
    ///
    /// Text fields are trimmed, blank tags dropped, and a missing image is
    /// replaced by a placeholder seeded with the title.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Required`] naming the first blank required field.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        for (field, value) in [
            ("title", &mut self.title),
            ("organizer", &mut self.organizer),
            ("location", &mut self.location),
            ("category", &mut self.category),
        ] {
            *value = value.trim().to_string();
            if value.is_empty() {
                return Err(ValidationError::Required { field });
            }
        }

        if self.capacity.is_some_and(|capacity| capacity.value() == 0) {
            return Err(ValidationError::Invalid {
                field: "capacity",
                reason: "must be at least 1; omit it for unlimited".to_string(),
            });
        }

        self.description = self.description.trim().to_string();
        self.tags = self
            .tags
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        self.image_url = self.image_url.trim().to_string();
        if self.image_url.is_empty() {
            self.image_url = placeholder_image_url(&self.title);
        }

        Ok(self)
    }
}

/// Split a comma-separated tag list, dropping blanks.
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Placeholder hero image for an event without one.
#[must_use]
pub fn placeholder_image_url(title: &str) -> String {
    format!(
        "https://picsum.photos/seed/{}/1600/900",
        urlencoding::encode(title)
    )
}

/// Browse filter for the event catalogue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Case-insensitive substring matched against title or organizer
    #[serde(default)]
    pub search: Option<String>,
    /// Exact category match
    #[serde(default)]
    pub category: Option<String>,
}

impl EventFilter {
    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let search_ok = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .is_none_or(|term| {
                let term = term.to_lowercase();
                event.title.to_lowercase().contains(&term)
                    || event.organizer.to_lowercase().contains(&term)
            });

        let category_ok = self
            .category
            .as_deref()
            .filter(|category| !category.is_empty())
            .is_none_or(|category| event.category == category);

        search_ok && category_ok
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// An issued ticket. Created once by the ticket issuer, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Globally unique ticket id
    pub id: TicketId,
    /// Event the ticket admits to
    pub event_id: EventId,
    /// Buyer identity; `None` for guest purchases
    pub owner_id: Option<UserId>,
    /// Where the ticket was sent
    pub owner_email: Email,
    /// Issuance time
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Whether this ticket was bought without an authenticated identity.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.owner_id.is_none()
    }
}

/// A ticket paired with the event it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketWithEvent {
    /// The ticket
    pub ticket: Ticket,
    /// Its event
    pub event: Event,
}

// ============================================================================
// Identity
// ============================================================================

/// Application user as seen by the storefront.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity provider user id
    pub id: UserId,
    /// Login email
    pub email: String,
    /// Profile display name; absent when no profile row exists yet
    pub display_name: Option<String>,
    /// Administrator flag
    pub is_admin: bool,
}

/// Identity state of one client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "user", rename_all = "snake_case")]
pub enum Session {
    /// Nobody is signed in
    #[default]
    Anonymous,
    /// A sign-in is in flight
    Authenticating,
    /// A user is signed in
    Authenticated(User),
}

impl Session {
    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Anonymous | Self::Authenticating => None,
        }
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn concert(capacity: Option<u32>, sold: u32) -> Event {
        let new = NewEvent {
            title: "Cosmic Funk Fest".to_string(),
            description: String::new(),
            date: Utc::now(),
            location: "Orion Nebula Amphitheater".to_string(),
            image_url: String::new(),
            category: "Music".to_string(),
            price: Money::from_cents(7500),
            organizer: "Galactic Grooves".to_string(),
            tags: vec![],
            capacity: capacity.map(Capacity::new),
        }
        .validate()
        .unwrap();
        let mut event = Event::from_new(EventId::new(), new, Utc::now());
        event.tickets_sold = sold;
        event
    }

    #[test]
    fn test_email_accepts_plausible_addresses() {
        for raw in ["a@b.com", "  user@topcitytickets.io ", "first.last+tag@mail.example.org"] {
            let email = Email::parse(raw).unwrap();
            assert_eq!(email.as_str(), raw.trim());
        }
    }

    #[test]
    fn test_email_rejects_malformed_addresses() {
        for raw in [
            "plainaddress",
            "@no-local.com",
            "no-domain@",
            "two@@ats.com",
            "a@b@c.com",
            "spaces in@side.com",
            "dot@nodot",
            "dot@.leading.com",
            "dot@trailing.com.",
            "dot@double..dot.com",
        ] {
            assert!(
                matches!(Email::parse(raw), Err(ValidationError::InvalidEmail { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_email_blank_is_required_error() {
        assert_eq!(
            Email::parse("   "),
            Err(ValidationError::Required { field: "email" })
        );
    }

    #[test]
    fn test_email_deserialization_validates() {
        let ok: Result<Email, _> = serde_json::from_str("\"a@b.com\"");
        assert!(ok.is_ok());
        let bad: Result<Email, _> = serde_json::from_str("\"not-an-email\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(7500).to_string(), "$75.00");
        assert_eq!(Money::from_cents(29_905).to_string(), "$299.05");
    }

    #[test]
    fn test_tickets_remaining() {
        assert_eq!(concert(None, 40).tickets_remaining(), None);
        assert_eq!(concert(Some(10), 4).tickets_remaining(), Some(6));
        assert!(concert(Some(2), 2).is_sold_out());
        assert!(!concert(None, 1_000).is_sold_out());
    }

    #[test]
    fn test_new_event_defaults_image_and_trims() {
        let event = concert(None, 0);
        assert_eq!(
            event.image_url,
            "https://picsum.photos/seed/Cosmic%20Funk%20Fest/1600/900"
        );
    }

    #[test]
    fn test_new_event_requires_title() {
        let mut new = NewEvent {
            title: "  ".to_string(),
            description: String::new(),
            date: Utc::now(),
            location: "Somewhere".to_string(),
            image_url: String::new(),
            category: "Art".to_string(),
            price: Money::default(),
            organizer: "Org".to_string(),
            tags: vec![],
            capacity: None,
        };
        assert_eq!(
            new.clone().validate(),
            Err(ValidationError::Required { field: "title" })
        );
        new.title = "Midnight Art Gala".to_string();
        new.tags = vec![" art ".to_string(), String::new()];
        assert_eq!(new.clone().validate().unwrap().tags, vec!["art".to_string()]);

        new.capacity = Some(Capacity::new(0));
        assert!(matches!(
            new.validate(),
            Err(ValidationError::Invalid { field: "capacity", .. })
        ));
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("funk, soul,, disco "), vec!["funk", "soul", "disco"]);
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn test_event_filter() {
        let event = concert(None, 0);
        assert!(EventFilter::default().matches(&event));
        assert!(EventFilter { search: Some("cosmic".into()), category: None }.matches(&event));
        assert!(EventFilter { search: Some("GROOVES".into()), category: None }.matches(&event));
        assert!(!EventFilter { search: Some("jazz".into()), category: None }.matches(&event));
        assert!(EventFilter { search: None, category: Some("Music".into()) }.matches(&event));
        assert!(!EventFilter { search: None, category: Some("Tech".into()) }.matches(&event));
    }

    #[test]
    fn test_session_serialization_is_tagged() {
        let json = serde_json::to_value(Session::Anonymous).unwrap();
        assert_eq!(json["state"], "anonymous");
    }

    proptest! {
        #[test]
        fn prop_parsed_email_has_single_at(local in "[a-z0-9._+]{1,20}", domain in "[a-z0-9]{1,10}\\.[a-z]{2,6}") {
            let email = Email::parse(&format!("{local}@{domain}")).unwrap();
            prop_assert_eq!(email.as_str().matches('@').count(), 1);
        }

        #[test]
        fn prop_remaining_never_exceeds_capacity(capacity in 1u32..10_000, sold in 0u32..10_000) {
            let remaining = concert(Some(capacity), sold).tickets_remaining().unwrap();
            prop_assert!(remaining <= capacity);
        }
    }
}
