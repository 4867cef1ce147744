//! Contract with the external identity provider.
//!
//! Credential storage and verification live entirely behind this trait. The
//! session manager only consumes the results.

use crate::error::AuthError;
use crate::types::{User, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::broadcast;

/// Boxed future returned by identity-provider operations.
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + Send + 'a>>;

/// A live session at the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySession {
    /// The signed-in user with profile data resolved
    pub user: User,
    /// When the provider will consider the session stale
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a successful sign-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignUpOutcome {
    /// Account created; the user must confirm their email before signing in.
    PendingConfirmation {
        /// Address the confirmation was sent to
        email: String,
    },
    /// Account created and signed in immediately (auto-confirm providers).
    Active(IdentitySession),
}

/// Out-of-band session change reported by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityChange {
    /// A session was established
    SignedIn,
    /// The session ended (explicitly or by expiry elsewhere)
    SignedOut,
    /// Tokens were refreshed; the user is unchanged
    TokenRefreshed,
    /// Profile data changed
    UserUpdated,
}

/// External identity provider.
///
/// # Change notifications
///
/// [`IdentityProvider::changes`] hands out a broadcast receiver; dropping the
/// receiver is the unsubscribe. Notifications only say *that* something
/// changed. Consumers re-read [`IdentityProvider::current_session`] to learn
/// the new state, which keeps them correct even if notifications race with
/// their own calls.
pub trait IdentityProvider: Send + Sync {
    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`], [`AuthError::EmailNotConfirmed`], or
    /// [`AuthError::Provider`] when the provider fails.
    fn sign_in(&self, email: &str, password: &str) -> AuthFuture<'_, IdentitySession>;

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// [`AuthError::AccountExists`] for a duplicate email,
    /// [`AuthError::WeakPassword`], or [`AuthError::Provider`].
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthFuture<'_, SignUpOutcome>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// [`AuthError::Provider`] when the provider fails.
    fn sign_out(&self) -> AuthFuture<'_, ()>;

    /// The session the provider currently holds, if any.
    ///
    /// # Errors
    ///
    /// [`AuthError::Provider`] when the provider fails.
    fn current_session(&self) -> AuthFuture<'_, Option<IdentitySession>>;

    /// Change the profile display name.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] if `user_id` has no session, or
    /// [`AuthError::Provider`].
    fn update_profile(&self, user_id: &UserId, display_name: &str) -> AuthFuture<'_, User>;

    /// Subscribe to out-of-band session changes.
    fn changes(&self) -> broadcast::Receiver<IdentityChange>;
}
