//! `PostgreSQL` storage for the box office engine.
//!
//! [`PostgresStore`] implements both [`EventStore`] and [`TicketStore`] on a
//! single connection pool. Capacity reservations are one conditional
//! `UPDATE`, so the "seats left?" check and the increment are atomic at the
//! database no matter how many processes share it.
//!
//! # Example
//!
//! ```no_run
//! use boxoffice_postgres::PostgresStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresStore::new("postgres://localhost/boxoffice").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use boxoffice_core::error::StoreError;
use boxoffice_core::store::{EventStore, ReserveOutcome, StoreFuture, TicketStore};
use boxoffice_core::types::{
    Capacity, Email, Event, EventFilter, EventId, Money, Ticket, TicketId, TicketWithEvent, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

const EVENT_COLUMNS: &str = "id, title, description, date, location, image_url, category, \
     price_cents, organizer, tags, capacity, tickets_sold, created_at";

/// Event and ticket storage backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a default pool configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::with_max_connections(database_url, 10).await
    }

    /// Connect with an explicit pool size.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn with_max_connections(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Round-trip a trivial query; used by readiness checks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database does not answer.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("ping"))?;
        Ok(())
    }
}

/// Map a sqlx failure into a [`StoreError`], counting it per operation.
fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |error| {
        metrics::counter!("boxoffice_store_errors_total", "operation" => operation).increment(1);
        tracing::warn!(operation, error = %error, "Database operation failed");
        let code = error
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned());
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(error.to_string())
            }
            _ if is_constraint_violation(code.as_deref()) => StoreError::Integrity(error.to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// SQLSTATE class 23: unique, foreign key, check and not-null violations.
/// These fail the same way on every attempt.
fn is_constraint_violation(sqlstate: Option<&str>) -> bool {
    sqlstate.is_some_and(|code| code.starts_with("23"))
}

fn integrity(field: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Integrity(format!("column {field} holds out-of-range value {value}"))
}

fn to_u32(field: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| integrity(field, value))
}

fn to_i32(field: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| integrity(field, value))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Integrity(format!("column {name}: {e}")))
}

fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    let price_cents: i64 = column(row, "price_cents")?;
    let capacity: Option<i32> = column(row, "capacity")?;
    let tickets_sold: i32 = column(row, "tickets_sold")?;

    Ok(Event {
        id: EventId::from_string(column::<String>(row, "id")?),
        title: column(row, "title")?,
        description: column(row, "description")?,
        date: column(row, "date")?,
        location: column(row, "location")?,
        image_url: column(row, "image_url")?,
        category: column(row, "category")?,
        price: Money::from_cents(
            u64::try_from(price_cents).map_err(|_| integrity("price_cents", price_cents))?,
        ),
        organizer: column(row, "organizer")?,
        tags: column(row, "tags")?,
        capacity: capacity
            .map(|value| to_u32("capacity", value).map(Capacity::new))
            .transpose()?,
        tickets_sold: to_u32("tickets_sold", tickets_sold)?,
        created_at: column(row, "created_at")?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, StoreError> {
    let owner_email: String = column(row, "owner_email")?;
    let owner_id: Option<String> = column(row, "owner_id")?;
    Ok(Ticket {
        id: TicketId::from_string(column::<String>(row, "ticket_id")?),
        event_id: EventId::from_string(column::<String>(row, "event_id")?),
        owner_id: owner_id.map(UserId::from_string),
        owner_email: Email::parse(&owner_email)
            .map_err(|e| StoreError::Integrity(format!("stored owner_email: {e}")))?,
        created_at: column::<DateTime<Utc>>(row, "ticket_created_at")?,
    })
}

fn joined_from_row(row: &PgRow) -> Result<TicketWithEvent, StoreError> {
    Ok(TicketWithEvent {
        ticket: ticket_from_row(row)?,
        event: event_from_row(row)?,
    })
}

/// `%term%` for `ILIKE`, with the pattern metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

const JOINED_SELECT: &str = "SELECT t.id AS ticket_id, t.event_id, t.owner_id, t.owner_email, \
     t.created_at AS ticket_created_at, \
     e.id, e.title, e.description, e.date, e.location, e.image_url, e.category, \
     e.price_cents, e.organizer, e.tags, e.capacity, e.tickets_sold, e.created_at \
     FROM tickets t JOIN events e ON e.id = t.event_id";

impl EventStore for PostgresStore {
    fn create_event(&self, event: Event) -> StoreFuture<'_, Event> {
        Box::pin(async move {
            let capacity = event
                .capacity
                .map(|capacity| to_i32("capacity", capacity.value()))
                .transpose()?;
            let price_cents = i64::try_from(event.price.cents())
                .map_err(|_| integrity("price_cents", event.price.cents()))?;

            let query = format!(
                "INSERT INTO events ({EVENT_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 RETURNING {EVENT_COLUMNS}"
            );
            let row = sqlx::query(&query)
                .bind(event.id.as_str())
                .bind(&event.title)
                .bind(&event.description)
                .bind(event.date)
                .bind(&event.location)
                .bind(&event.image_url)
                .bind(&event.category)
                .bind(price_cents)
                .bind(&event.organizer)
                .bind(&event.tags)
                .bind(capacity)
                .bind(to_i32("tickets_sold", event.tickets_sold)?)
                .bind(event.created_at)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("create_event"))?;

            event_from_row(&row)
        })
    }

    fn get_event(&self, id: &EventId) -> StoreFuture<'_, Option<Event>> {
        let id = id.clone();
        Box::pin(async move {
            let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
            let row = sqlx::query(&query)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get_event"))?;

            row.as_ref().map(event_from_row).transpose()
        })
    }

    fn list_events(&self, filter: &EventFilter) -> StoreFuture<'_, Vec<Event>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(like_pattern);
        let category = filter.category.clone().filter(|category| !category.is_empty());

        Box::pin(async move {
            let query = format!(
                "SELECT {EVENT_COLUMNS} FROM events \
                 WHERE ($1::text IS NULL OR title ILIKE $1 OR organizer ILIKE $1) \
                   AND ($2::text IS NULL OR category = $2) \
                 ORDER BY date ASC, id ASC"
            );
            let rows = sqlx::query(&query)
                .bind(search)
                .bind(category)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("list_events"))?;

            rows.iter().map(event_from_row).collect()
        })
    }

    fn try_reserve(&self, id: &EventId) -> StoreFuture<'_, ReserveOutcome> {
        let id = id.clone();
        Box::pin(async move {
            let claimed = sqlx::query(
                r"
                UPDATE events
                SET tickets_sold = tickets_sold + 1
                WHERE id = $1 AND (capacity IS NULL OR tickets_sold < capacity)
                RETURNING tickets_sold, capacity
                ",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("try_reserve"))?;

            if let Some(row) = claimed {
                let tickets_sold: i32 = column(&row, "tickets_sold")?;
                let capacity: Option<i32> = column(&row, "capacity")?;
                return Ok(ReserveOutcome::Reserved {
                    tickets_sold: to_u32("tickets_sold", tickets_sold)?,
                    capacity: capacity
                        .map(|value| to_u32("capacity", value).map(Capacity::new))
                        .transpose()?,
                });
            }

            let (exists,): (bool,) =
                sqlx::query_as("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
                    .bind(id.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_error("try_reserve"))?;

            Ok(if exists {
                ReserveOutcome::SoldOut
            } else {
                ReserveOutcome::NotFound
            })
        })
    }

    fn release(&self, id: &EventId) -> StoreFuture<'_, bool> {
        let id = id.clone();
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE events
                SET tickets_sold = tickets_sold - 1
                WHERE id = $1 AND tickets_sold > 0
                ",
            )
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error("release"))?;

            Ok(result.rows_affected() == 1)
        })
    }
}

impl TicketStore for PostgresStore {
    fn insert_ticket(&self, ticket: &Ticket) -> StoreFuture<'_, ()> {
        let ticket = ticket.clone();
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO tickets (id, event_id, owner_id, owner_email, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                ",
            )
            .bind(ticket.id.as_str())
            .bind(ticket.event_id.as_str())
            .bind(ticket.owner_id.as_ref().map(UserId::as_str))
            .bind(ticket.owner_email.as_str())
            .bind(ticket.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_error("insert_ticket"))?;

            if result.rows_affected() == 0 {
                tracing::debug!(ticket_id = %ticket.id, "Ticket already stored");
            }
            Ok(())
        })
    }

    fn get_ticket(&self, id: &TicketId) -> StoreFuture<'_, Option<TicketWithEvent>> {
        let id = id.clone();
        Box::pin(async move {
            let query = format!("{JOINED_SELECT} WHERE t.id = $1");
            let row = sqlx::query(&query)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get_ticket"))?;

            row.as_ref().map(joined_from_row).transpose()
        })
    }

    fn tickets_for_owner(&self, owner: &UserId) -> StoreFuture<'_, Vec<TicketWithEvent>> {
        let owner = owner.clone();
        Box::pin(async move {
            let query = format!(
                "{JOINED_SELECT} WHERE t.owner_id = $1 ORDER BY t.created_at DESC, t.seq DESC"
            );
            let rows = sqlx::query(&query)
                .bind(owner.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("tickets_for_owner"))?;

            rows.iter().map(joined_from_row).collect()
        })
    }
}
