//! Scriptable identity provider.
//!
//! Keeps accounts in memory keyed by lowercased email, holds at most one
//! session (like a browser tab), and broadcasts an [`IdentityChange`] for
//! every session change, including ones triggered from the test side with
//! [`MockIdentityProvider::expire_session`].

use boxoffice_core::error::AuthError;
use boxoffice_core::identity::{
    AuthFuture, IdentityChange, IdentityProvider, IdentitySession, SignUpOutcome,
};
use boxoffice_core::types::{User, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Default minimum password length.
pub const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user: User,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
struct ProviderState {
    accounts: HashMap<String, Account>,
    session: Option<IdentitySession>,
    fail_next: Option<AuthError>,
}

/// In-memory identity provider for tests and the demo client.
///
/// # Example
///
/// ```
/// use boxoffice_testing::MockIdentityProvider;
/// use boxoffice_core::identity::IdentityProvider;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = MockIdentityProvider::new().with_account("a@b.com", "secret123", "Ada");
/// let session = provider.sign_in("a@b.com", "secret123").await?;
/// assert_eq!(session.user.display_name.as_deref(), Some("Ada"));
/// # Ok(())
/// # }
/// ```
pub struct MockIdentityProvider {
    state: Arc<Mutex<ProviderState>>,
    changes: broadcast::Sender<IdentityChange>,
    require_confirmation: bool,
    min_password_len: usize,
    sign_in_calls: AtomicUsize,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    /// Provider that confirms accounts immediately.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(ProviderState::default())),
            changes,
            require_confirmation: false,
            min_password_len: MIN_PASSWORD_LEN,
            sign_in_calls: AtomicUsize::new(0),
        }
    }

    /// New accounts must be confirmed with [`Self::confirm`] before they can
    /// sign in.
    #[must_use]
    pub const fn requiring_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    /// Seed a confirmed account.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str, display_name: &str) -> Self {
        self.insert_account(email, password, display_name, true, false);
        self
    }

    /// Seed a confirmed administrator account.
    #[must_use]
    pub fn with_admin(self, email: &str, password: &str, display_name: &str) -> Self {
        self.insert_account(email, password, display_name, true, true);
        self
    }

    fn insert_account(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        confirmed: bool,
        is_admin: bool,
    ) -> User {
        let user = User {
            id: UserId::new(),
            email: email.trim().to_string(),
            display_name: Some(display_name.trim())
                .filter(|name| !name.is_empty())
                .map(ToString::to_string),
            is_admin,
        };
        if let Ok(mut state) = self.lock() {
            state.accounts.insert(
                email.trim().to_lowercase(),
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                    confirmed,
                },
            );
        }
        user
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProviderState>, AuthError> {
        self.state
            .lock()
            .map_err(|_| AuthError::Provider("mock provider lock poisoned".to_string()))
    }

    fn notify(&self, change: IdentityChange) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    /// Mark an account's email as confirmed. Returns `false` if unknown.
    pub fn confirm(&self, email: &str) -> bool {
        self.lock()
            .ok()
            .and_then(|mut state| {
                state
                    .accounts
                    .get_mut(&email.trim().to_lowercase())
                    .map(|account| account.confirmed = true)
            })
            .is_some()
    }

    /// Make the next provider call fail with `error`.
    pub fn fail_next(&self, error: AuthError) {
        if let Ok(mut state) = self.lock() {
            state.fail_next = Some(error);
        }
    }

    /// End the session out-of-band, as an expiry or another tab would.
    pub fn expire_session(&self) {
        let had_session = self
            .lock()
            .map(|mut state| state.session.take().is_some())
            .unwrap_or(false);
        if had_session {
            self.notify(IdentityChange::SignedOut);
        }
    }

    /// Broadcast a token refresh without changing the session.
    pub fn refresh_token(&self) {
        self.notify(IdentityChange::TokenRefreshed);
    }

    /// Number of accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.lock().map(|state| state.accounts.len()).unwrap_or_default()
    }

    /// Number of `sign_in` calls, successful or not.
    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    fn take_failure(state: &mut ProviderState) -> Result<(), AuthError> {
        state.fail_next.take().map_or(Ok(()), Err)
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn sign_in(&self, email: &str, password: &str) -> AuthFuture<'_, IdentitySession> {
        let key = email.trim().to_lowercase();
        let password = password.to_string();
        Box::pin(async move {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            let session = {
                let mut state = self.lock()?;
                Self::take_failure(&mut state)?;
                let account = state
                    .accounts
                    .get(&key)
                    .filter(|account| account.password == password)
                    .ok_or(AuthError::InvalidCredentials)?;
                if !account.confirmed {
                    return Err(AuthError::EmailNotConfirmed);
                }
                let session = IdentitySession {
                    user: account.user.clone(),
                    expires_at: None,
                };
                state.session = Some(session.clone());
                session
            };
            self.notify(IdentityChange::SignedIn);
            Ok(session)
        })
    }

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthFuture<'_, SignUpOutcome> {
        let email = email.trim().to_string();
        let password = password.to_string();
        let display_name = display_name.to_string();
        Box::pin(async move {
            {
                let mut state = self.lock()?;
                Self::take_failure(&mut state)?;
                if password.chars().count() < self.min_password_len {
                    return Err(AuthError::WeakPassword {
                        min_length: self.min_password_len,
                    });
                }
                if state.accounts.contains_key(&email.to_lowercase()) {
                    return Err(AuthError::AccountExists { email });
                }
            }

            let user = self.insert_account(
                &email,
                &password,
                &display_name,
                !self.require_confirmation,
                false,
            );
            if self.require_confirmation {
                return Ok(SignUpOutcome::PendingConfirmation { email });
            }

            let session = IdentitySession {
                user,
                expires_at: None,
            };
            self.lock()?.session = Some(session.clone());
            self.notify(IdentityChange::SignedIn);
            Ok(SignUpOutcome::Active(session))
        })
    }

    fn sign_out(&self) -> AuthFuture<'_, ()> {
        Box::pin(async move {
            {
                let mut state = self.lock()?;
                Self::take_failure(&mut state)?;
                state.session = None;
            }
            self.notify(IdentityChange::SignedOut);
            Ok(())
        })
    }

    fn current_session(&self) -> AuthFuture<'_, Option<IdentitySession>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            Self::take_failure(&mut state)?;
            Ok(state.session.clone())
        })
    }

    fn update_profile(&self, user_id: &UserId, display_name: &str) -> AuthFuture<'_, User> {
        let user_id = user_id.clone();
        let display_name = display_name.trim().to_string();
        Box::pin(async move {
            let user = {
                let mut state = self.lock()?;
                Self::take_failure(&mut state)?;
                let session = state
                    .session
                    .as_mut()
                    .filter(|session| session.user.id == user_id)
                    .ok_or(AuthError::NotAuthenticated)?;
                session.user.display_name =
                    Some(display_name).filter(|name| !name.is_empty());
                let user = session.user.clone();

                if let Some(account) = state
                    .accounts
                    .values_mut()
                    .find(|account| account.user.id == user_id)
                {
                    account.user = user.clone();
                }
                user
            };
            self.notify(IdentityChange::UserUpdated);
            Ok(user)
        })
    }

    fn changes(&self) -> broadcast::Receiver<IdentityChange> {
        self.changes.subscribe()
    }
}
