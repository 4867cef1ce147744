//! Error taxonomy for the box office.
//!
//! Every operation returns one of these as a value. None of them are used as
//! control-flow signals across component boundaries, and `SoldOut` in
//! particular is an expected outcome under load rather than a fault.

use crate::types::{EventId, TicketId};
use thiserror::Error;

/// Malformed input. Never corrupts state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("{field} is required")]
    Required {
        /// Name of the missing field
        field: &'static str,
    },

    /// The email address is not plausible.
    #[error("'{value}' is not a valid email address")]
    InvalidEmail {
        /// The rejected input (trimmed)
        value: String,
    },

    /// Any other field-level problem.
    #[error("{field} is invalid: {reason}")]
    Invalid {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Persistence or communication failure in a backing store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database rejected or failed the operation.
    #[error("Database error: {0}")]
    Database(String),

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored data violates an invariant (e.g. a ticket whose event is gone).
    #[error("Integrity error: {0}")]
    Integrity(String),
}

/// Why a capacity reservation was not granted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReserveError {
    /// No event with this id.
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// Every unit of capacity is taken.
    #[error("Event {0} is sold out")]
    SoldOut(EventId),

    /// The backing store failed; nothing was reserved.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a failed purchase.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    /// The request was malformed; nothing was reserved.
    #[error("Invalid purchase request: {0}")]
    Validation(#[from] ValidationError),

    /// The event does not exist.
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// Capacity exhausted.
    #[error("Event {0} is sold out")]
    SoldOut(EventId),

    /// Persistence failed. Any reservation taken for this purchase has been
    /// released before this is returned.
    #[error("Ticket could not be issued: {0}")]
    Store(#[from] StoreError),
}

impl From<ReserveError> for PurchaseError {
    fn from(err: ReserveError) -> Self {
        match err {
            ReserveError::EventNotFound(id) => Self::EventNotFound(id),
            ReserveError::SoldOut(id) => Self::SoldOut(id),
            ReserveError::Store(err) => Self::Store(err),
        }
    }
}

impl PurchaseError {
    /// Stable machine-readable code for clients.
    ///
    /// # Examples
    ///
    /// ```
    /// # use boxoffice_core::error::PurchaseError;
    /// # use boxoffice_core::types::EventId;
    /// let err = PurchaseError::SoldOut(EventId::from_string("event-1"));
    /// assert_eq!(err.code(), "SOLD_OUT");
    /// ```
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::SoldOut(_) => "SOLD_OUT",
            Self::Store(_) => "STORE_FAILURE",
        }
    }

    /// Short message for rendering inline next to the purchase button.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(ValidationError::InvalidEmail { .. } | ValidationError::Required {
                field: "email",
            }) => "Invalid email".to_string(),
            Self::Validation(err) => format!("Please check your details: {err}"),
            Self::EventNotFound(_) => "This event is no longer available".to_string(),
            Self::SoldOut(_) => "Sold Out".to_string(),
            Self::Store(_) => "Purchase failed, please try again".to_string(),
        }
    }
}

/// Failed ticket lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No ticket with this id.
    #[error("Ticket {0} not found")]
    NotFound(TicketId),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure reported by the identity provider or the session manager.
///
/// Always returned to the caller as a value so the auth form can render it
/// inline without losing what the user typed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong email or password.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Sign-up for an email that already has an account.
    #[error("User already exists: {email}")]
    AccountExists {
        /// The duplicate email
        email: String,
    },

    /// The account exists but its email has not been confirmed yet.
    #[error("Email not confirmed")]
    EmailNotConfirmed,

    /// Password rejected by the provider's policy.
    #[error("Password should be at least {min_length} characters")]
    WeakPassword {
        /// Minimum accepted length
        min_length: usize,
    },

    /// Email rejected before reaching the provider.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Operation needs a signed-in user.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The provider failed or could not be reached.
    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Returns `true` if this error is due to something the user typed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use boxoffice_core::error::AuthError;
    /// assert!(AuthError::InvalidCredentials.is_user_error());
    /// assert!(!AuthError::Provider("timeout".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::AccountExists { .. }
                | Self::EmailNotConfirmed
                | Self::WeakPassword { .. }
                | Self::InvalidEmail(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_error_maps_onto_purchase_error() {
        let id = EventId::from_string("event-1");
        assert_eq!(
            PurchaseError::from(ReserveError::SoldOut(id.clone())),
            PurchaseError::SoldOut(id.clone())
        );
        assert_eq!(
            PurchaseError::from(ReserveError::EventNotFound(id.clone())),
            PurchaseError::EventNotFound(id)
        );
        assert_eq!(
            PurchaseError::from(ReserveError::Store(StoreError::Unavailable("down".into()))),
            PurchaseError::Store(StoreError::Unavailable("down".into()))
        );
    }

    #[test]
    fn test_user_messages_are_keyed_by_kind() {
        let id = EventId::from_string("event-1");
        assert_eq!(PurchaseError::SoldOut(id.clone()).user_message(), "Sold Out");
        assert_eq!(
            PurchaseError::Validation(ValidationError::InvalidEmail { value: "x".into() })
                .user_message(),
            "Invalid email"
        );
        assert_ne!(
            PurchaseError::EventNotFound(id).user_message(),
            PurchaseError::Store(StoreError::Database("boom".into())).user_message()
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let id = EventId::from_string("e");
        let codes = [
            PurchaseError::Validation(ValidationError::Required { field: "email" }).code(),
            PurchaseError::EventNotFound(id.clone()).code(),
            PurchaseError::SoldOut(id).code(),
            PurchaseError::Store(StoreError::Database(String::new())).code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_auth_error_display() {
        let err = AuthError::AccountExists { email: "a@b.com".into() };
        assert_eq!(err.to_string(), "User already exists: a@b.com");
        assert!(err.is_user_error());
    }
}
