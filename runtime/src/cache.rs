//! Ticket cache: the tickets belonging to whoever is signed in.
//!
//! The cache subscribes to a [`SessionManager`] and reconciles itself on every
//! session change:
//!
//! - `Authenticated(user)`: one `tickets_for_owner` fetch; the result replaces
//!   the contents wholesale
//! - `Anonymous`: everything is cleared
//! - `Authenticating`: nothing happens until the outcome is known
//!
//! Session notifications are forwarded over a channel to a single worker
//! task, so reconciliations run one at a time in notification order and the
//! session manager never waits on the store.
//!
//! Purchases show up immediately through [`TicketCache::add_local`]. A local
//! entry stays "pending" until an authoritative fetch for its owner contains
//! the same ticket id, which is when the fetched copy supersedes it.

use crate::metrics::CacheMetrics;
use crate::session::{SessionManager, SessionSubscription};
use boxoffice_core::store::TicketStore;
use boxoffice_core::types::{Event, Session, Ticket, TicketWithEvent, User, UserId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Point-in-time view of the cache.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Bumped on every change
    pub generation: u64,
    /// Whose tickets these are; `None` when signed out
    pub owner: Option<UserId>,
    /// Tickets, newest first
    pub entries: Vec<TicketWithEvent>,
    /// A fetch is in flight
    pub loading: bool,
    /// Why the last fetch failed, cleared by the next successful one
    pub last_error: Option<String>,
}

impl CacheSnapshot {
    /// Whether a ticket with this id is cached.
    #[must_use]
    pub fn contains(&self, ticket: &Ticket) -> bool {
        self.entries.iter().any(|entry| entry.ticket.id == ticket.id)
    }
}

enum Command {
    Session(Session),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Inner {
    snapshot: CacheSnapshot,
    pending: Vec<TicketWithEvent>,
}

struct State {
    inner: Mutex<Inner>,
    published: watch::Sender<CacheSnapshot>,
}

impl State {
    fn update(&self, apply: impl FnOnce(&mut Inner)) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut inner);
        inner.snapshot.generation += 1;
        self.published.send_replace(inner.snapshot.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reactive cache of the current user's tickets.
pub struct TicketCache {
    state: Arc<State>,
    commands: mpsc::UnboundedSender<Command>,
    _subscription: SessionSubscription,
    worker: JoinHandle<()>,
}

impl TicketCache {
    /// Attach a cache to `sessions`, fetching through `tickets`.
    ///
    /// The current session is reconciled right away. Must be called from
    /// within a tokio runtime.
    #[must_use]
    pub fn attach(sessions: &SessionManager, tickets: Arc<dyn TicketStore>) -> Self {
        let (published, _) = watch::channel(CacheSnapshot::default());
        let state = Arc::new(State {
            inner: Mutex::new(Inner::default()),
            published,
        });

        let (commands, receiver) = mpsc::unbounded_channel();
        let forward = commands.clone();
        let subscription = sessions.subscribe(move |session| {
            // Only fails once the worker is gone, i.e. the cache was dropped.
            let _ = forward.send(Command::Session(session.clone()));
        });
        let _ = commands.send(Command::Session(sessions.current()));

        let worker = tokio::spawn(run_worker(Arc::clone(&state), tickets, receiver));

        Self {
            state,
            commands,
            _subscription: subscription,
            worker,
        }
    }

    /// Current contents.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Current tickets, newest first.
    #[must_use]
    pub fn entries(&self) -> Vec<TicketWithEvent> {
        self.state.lock().snapshot.entries.clone()
    }

    /// Receive every new snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CacheSnapshot> {
        self.state.published.subscribe()
    }

    /// Show a just-purchased ticket without waiting for the next fetch.
    ///
    /// The entry is prepended unless a ticket with the same id is already
    /// cached.
    pub fn add_local(&self, ticket: Ticket, event: Event) {
        let ticket_id = ticket.id.clone();
        let mut added = false;
        self.state.update(|inner| {
            if inner.snapshot.entries.iter().any(|e| e.ticket.id == ticket_id) {
                return;
            }
            let entry = TicketWithEvent { ticket, event };
            inner.pending.insert(0, entry.clone());
            inner.snapshot.entries.insert(0, entry);
            added = true;
        });
        debug!(ticket_id = %ticket_id, added, "Local ticket added");
    }

    /// Wait until every session change queued so far has been reconciled.
    pub async fn sync(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl Drop for TicketCache {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    state: Arc<State>,
    tickets: Arc<dyn TicketStore>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut last_applied: Option<Session> = None;

    while let Some(command) = commands.recv().await {
        match command {
            Command::Flush(done) => {
                let _ = done.send(());
            }
            Command::Session(session) => {
                if last_applied.as_ref() == Some(&session) {
                    continue;
                }
                match &session {
                    Session::Authenticated(user) => reconcile(&state, tickets.as_ref(), user).await,
                    Session::Anonymous => clear(&state),
                    Session::Authenticating => {}
                }
                last_applied = Some(session);
            }
        }
    }
    debug!("Ticket cache worker stopped");
}

fn owned_by(entry: &TicketWithEvent, owner: &UserId) -> bool {
    entry.ticket.owner_id.as_ref() == Some(owner)
}

#[tracing::instrument(skip(state, tickets, user), fields(user_id = %user.id))]
async fn reconcile(state: &State, tickets: &dyn TicketStore, user: &User) {
    state.update(|inner| {
        if inner.snapshot.owner.as_ref() != Some(&user.id) {
            inner.pending.retain(|entry| owned_by(entry, &user.id));
            inner.snapshot.entries.clone_from(&inner.pending);
            inner.snapshot.owner = Some(user.id.clone());
        }
        inner.snapshot.loading = true;
    });

    let fetched = tickets.tickets_for_owner(&user.id).await;

    match fetched {
        Ok(fetched) => {
            let count = fetched.len();
            state.update(|inner| {
                let authoritative: HashSet<_> =
                    fetched.iter().map(|entry| entry.ticket.id.clone()).collect();
                inner.pending.retain(|entry| {
                    owned_by(entry, &user.id) && !authoritative.contains(&entry.ticket.id)
                });

                let mut entries = inner.pending.clone();
                entries.extend(fetched);
                inner.snapshot.entries = entries;
                inner.snapshot.loading = false;
                inner.snapshot.last_error = None;
            });
            CacheMetrics::record_reconciliation("loaded");
            info!(count, "Ticket cache reconciled");
        }
        Err(err) => {
            state.update(|inner| {
                inner.pending.retain(|entry| owned_by(entry, &user.id));
                inner.snapshot.entries.clone_from(&inner.pending);
                inner.snapshot.loading = false;
                inner.snapshot.last_error = Some(err.to_string());
            });
            CacheMetrics::record_reconciliation("failed");
            warn!(error = %err, "Ticket cache reconciliation failed");
        }
    }
}

fn clear(state: &State) {
    state.update(|inner| {
        inner.pending.clear();
        inner.snapshot.entries.clear();
        inner.snapshot.owner = None;
        inner.snapshot.loading = false;
        inner.snapshot.last_error = None;
    });
    CacheMetrics::record_reconciliation("cleared");
    debug!("Ticket cache cleared");
}
