use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Event, NewEvent, NewUser, Ownership, Ticket, User, UserRole};
use crate::store::{CredentialStore, InventoryStore};
use crate::utils::{AppError, AppResult};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, phone_number, role, \
     is_active, active_token_hash, created_at, updated_at";

const TICKET_COLUMNS: &str = "id, event_id, seat_number, price, status, owner_id, updated_at";

/// Postgres SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout: Option<Duration>) -> Self {
        Self { pool, lock_timeout }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn map_lock_error(e: sqlx::Error, ticket_id: Uuid) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            return AppError::Busy(format!(
                "Ticket '{}' is being processed by another request, try again",
                ticket_id
            ));
        }
    }
    AppError::DatabaseError(e)
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, full_name, phone_number, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.phone_number)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Email already registered".to_string())
            } else {
                AppError::DatabaseError(e)
            }
        })
    }

    async fn set_token_fingerprint(
        &self,
        user_id: Uuid,
        fingerprint: Option<&str>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET active_token_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User '{}' not found", user_id)));
        }
        Ok(())
    }

    async fn list_users(&self, offset: i64, limit: i64) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at, id OFFSET $1 LIMIT $2",
            USER_COLUMNS
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn set_role(&self, user_id: Uuid, role: UserRole) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_active(&self, user_id: Uuid, active: bool) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> AppResult<Self::Tx> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.lock_timeout {
            // Equivalent to SET LOCAL; scoped to this transaction only
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut *tx)
                .await?;
        }

        Ok(tx)
    }

    async fn lock_ticket(&self, tx: &mut Self::Tx, ticket_id: Uuid) -> AppResult<Option<Ticket>> {
        debug!(%ticket_id, "Acquiring ticket row lock");

        sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE id = $1 FOR UPDATE",
            TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_lock_error(e, ticket_id))
    }

    async fn update_ticket(
        &self,
        tx: &mut Self::Tx,
        ticket_id: Uuid,
        ownership: Ownership,
    ) -> AppResult<Ticket> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "UPDATE tickets SET status = $2, owner_id = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .bind(ownership.status())
        .bind(ownership.owner_id())
        .fetch_one(&mut **tx)
        .await?;
        Ok(ticket)
    }

    async fn commit(&self, tx: Self::Tx) -> AppResult<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> AppResult<()> {
        tx.rollback().await?;
        Ok(())
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> AppResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn create_event(&self, event: &NewEvent) -> AppResult<Event> {
        let seat_count = i32::try_from(event.total_tickets)
            .map_err(|_| AppError::ValidationError("total_tickets is too large".to_string()))?;

        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Event>(
            "INSERT INTO events (name, date, location) VALUES ($1, $2, $3) \
             RETURNING id, name, date, location, created_at",
        )
        .bind(&event.name)
        .bind(event.date)
        .bind(&event.location)
        .fetch_one(&mut *tx)
        .await?;

        // Seats are generated server-side in a single statement
        sqlx::query(
            "INSERT INTO tickets (event_id, seat_number, price) \
             SELECT $1, 'Seat-' || n, $2 FROM generate_series(1, $3) AS n",
        )
        .bind(created.id)
        .bind(event.ticket_price)
        .bind(seat_count)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_event(&self, event_id: Uuid) -> AppResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, name, date, location, created_at FROM events WHERE id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn list_tickets(&self, event_id: Uuid) -> AppResult<Vec<Ticket>> {
        // Seat labels sort by their numeric suffix
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {} FROM tickets WHERE event_id = $1 \
             ORDER BY length(seat_number), seat_number",
            TICKET_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn delete_event(&self, event_id: Uuid) -> AppResult<bool> {
        // tickets.event_id is ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
