//! Session manager: the single source of truth for "who is signed in".
//!
//! Holds the current [`Session`] and an ordered list of listeners. Every
//! transition is applied under one FIFO lock, so two transitions never
//! interleave and listeners observe them in the order they happened.
//!
//! # States
//!
//! ```text
//! Anonymous ──login──▶ Authenticating ──ok──▶ Authenticated(user)
//!     ▲                      │                     │
//!     │                      └──error──▶ (previous state)
//!     └─────────────── logout / provider sign-out ─┘
//! ```
//!
//! Signing in again while `Authenticated` skips `Authenticating`: a failed
//! attempt leaves the session untouched, a successful one moves straight to
//! the new user.
//!
//! Listeners are only notified when the session actually changes, so a
//! provider echo of a transition this manager already applied is silent.

use crate::metrics::SessionMetrics;
use boxoffice_core::error::AuthError;
use boxoffice_core::identity::{IdentityChange, IdentityProvider, IdentitySession, SignUpOutcome};
use boxoffice_core::types::{Email, Session, User};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type Listener = Arc<dyn Fn(&Session) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

#[derive(Default)]
struct Shared {
    current: Mutex<Session>,
    listeners: Mutex<Listeners>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Listeners run outside these locks, so a poisoned guard still holds
    // consistent data.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by [`SessionManager::subscribe`].
///
/// The listener stays registered until [`SessionSubscription::unsubscribe`]
/// is called or the handle is dropped.
#[must_use = "dropping the subscription unsubscribes the listener"]
pub struct SessionSubscription {
    shared: Weak<Shared>,
    id: u64,
}

impl SessionSubscription {
    /// Stop receiving session changes.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the listener registered for as long as the manager lives.
    pub fn detach(mut self) {
        self.shared = Weak::new();
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.listeners)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Owns the client's identity state and drives it through the provider.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    transitions: tokio::sync::Mutex<()>,
    shared: Arc<Shared>,
}

impl SessionManager {
    /// Create a manager in the `Anonymous` state.
    ///
    /// Call [`SessionManager::restore`] to pick up an existing provider
    /// session, and [`SessionManager::watch_provider`] to follow out-of-band
    /// changes.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            transitions: tokio::sync::Mutex::new(()),
            shared: Arc::new(Shared::default()),
        }
    }

    /// The current session.
    #[must_use]
    pub fn current(&self) -> Session {
        lock(&self.shared.current).clone()
    }

    /// Register a listener for session changes.
    ///
    /// Listeners run in registration order with the new session. A listener
    /// that panics is logged and skipped; later listeners still run. Listeners
    /// must not block: forward to a channel for anything slow.
    pub fn subscribe<F>(&self, listener: F) -> SessionSubscription
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.shared.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        debug!(listener_id = id, "Session listener registered");

        SessionSubscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).entries.len()
    }

    /// Apply `next` and notify listeners if it differs from the current
    /// session. Callers hold the transition lock.
    fn publish(&self, next: Session) {
        {
            let mut current = lock(&self.shared.current);
            if *current == next {
                return;
            }
            current.clone_from(&next);
        }

        SessionMetrics::record_transition(next.label());
        debug!(state = next.label(), "Session transition");

        let listeners: Vec<(u64, Listener)> = lock(&self.shared.listeners).entries.clone();
        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&next))).is_err() {
                error!(listener_id = id, state = next.label(), "Session listener panicked");
            }
        }
    }

    /// Enter `Authenticating` for a sign-in or sign-up attempt, unless
    /// someone is already signed in.
    fn begin_attempt(&self, previous: &Session) {
        if !previous.is_authenticated() {
            self.publish(Session::Authenticating);
        }
    }

    fn session_for(result: Result<Option<IdentitySession>, AuthError>) -> Session {
        match result {
            Ok(Some(session)) => Session::Authenticated(session.user),
            Ok(None) => Session::Anonymous,
            Err(err) => {
                warn!(error = %err, "Identity provider unavailable, treating as signed out");
                Session::Anonymous
            }
        }
    }

    /// Pick up whatever session the provider already holds.
    ///
    /// Always ends in `Authenticated` or `Anonymous`; a provider failure
    /// counts as no session.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> Session {
        let _guard = self.transitions.lock().await;
        let next = Self::session_for(self.provider.current_session().await);
        info!(state = next.label(), "Session restored");
        self.publish(next.clone());
        next
    }

    /// Sign in.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidEmail`] before contacting the provider, otherwise
    /// whatever the provider reports. The session is left as it was.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = parse_email(email)?;
        let _guard = self.transitions.lock().await;
        let previous = self.current();

        self.begin_attempt(&previous);
        match self.provider.sign_in(email.as_str(), password).await {
            Ok(session) => {
                info!(user_id = %session.user.id, "Signed in");
                self.publish(Session::Authenticated(session.user.clone()));
                Ok(session.user)
            }
            Err(err) => {
                warn!(error = %err, "Sign-in failed");
                self.publish(previous);
                Err(err)
            }
        }
    }

    /// Register a new account.
    ///
    /// Providers that require email confirmation return
    /// [`SignUpOutcome::PendingConfirmation`] and the session is left as it
    /// was; auto-confirming providers sign the user straight in.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidEmail`] before contacting the provider, otherwise
    /// whatever the provider reports (e.g. [`AuthError::AccountExists`]).
    #[tracing::instrument(skip(self, password))]
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = parse_email(email)?;
        let _guard = self.transitions.lock().await;
        let previous = self.current();

        self.begin_attempt(&previous);
        match self
            .provider
            .sign_up(email.as_str(), password, display_name.trim())
            .await
        {
            Ok(SignUpOutcome::Active(session)) => {
                info!(user_id = %session.user.id, "Signed up and signed in");
                self.publish(Session::Authenticated(session.user.clone()));
                Ok(SignUpOutcome::Active(session))
            }
            Ok(pending @ SignUpOutcome::PendingConfirmation { .. }) => {
                info!("Signed up, awaiting email confirmation");
                self.publish(previous);
                Ok(pending)
            }
            Err(err) => {
                warn!(error = %err, "Sign-up failed");
                self.publish(previous);
                Err(err)
            }
        }
    }

    /// Sign out.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports; the session is left as it was.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _guard = self.transitions.lock().await;
        self.provider.sign_out().await.inspect_err(|err| {
            warn!(error = %err, "Sign-out failed");
        })?;
        info!("Signed out");
        self.publish(Session::Anonymous);
        Ok(())
    }

    /// Change the signed-in user's display name.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] when nobody is signed in, otherwise
    /// whatever the provider reports.
    #[tracing::instrument(skip(self))]
    pub async fn update_profile(&self, display_name: &str) -> Result<User, AuthError> {
        let _guard = self.transitions.lock().await;
        let Session::Authenticated(user) = self.current() else {
            return Err(AuthError::NotAuthenticated);
        };

        let updated = self
            .provider
            .update_profile(&user.id, display_name.trim())
            .await
            .inspect_err(|err| warn!(error = %err, "Profile update failed"))?;
        info!(user_id = %updated.id, "Profile updated");
        self.publish(Session::Authenticated(updated.clone()));
        Ok(updated)
    }

    /// Follow out-of-band provider changes (token refresh, sign-out in
    /// another tab, expiry).
    ///
    /// Each notification re-reads the provider's current session through the
    /// transition queue, so a notification that arrives after a newer local
    /// transition cannot roll it back. The task ends when the manager is
    /// dropped or the provider closes its channel.
    pub fn watch_provider(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.provider.changes();
        let manager = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let change = match changes.recv().await {
                    Ok(change) => Some(change),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed identity changes, resynchronizing");
                        None
                    }
                    Err(RecvError::Closed) => break,
                };

                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.apply_provider_change(change).await;
            }
            debug!("Identity provider watch ended");
        })
    }

    async fn apply_provider_change(&self, change: Option<IdentityChange>) {
        let _guard = self.transitions.lock().await;
        match self.provider.current_session().await {
            Ok(session) => {
                let next = session.map_or(Session::Anonymous, |s| Session::Authenticated(s.user));
                debug!(?change, state = next.label(), "Applying provider change");
                self.publish(next);
            }
            Err(err) => {
                warn!(?change, error = %err, "Could not read provider session, keeping current state");
            }
        }
    }
}

fn parse_email(raw: &str) -> Result<Email, AuthError> {
    Email::parse(raw).map_err(|_| AuthError::InvalidEmail(raw.trim().to_string()))
}
