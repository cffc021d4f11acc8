use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::event::seat_label;
use crate::models::{
    Event, NewEvent, NewUser, Ownership, Ticket, TicketStatus, User, UserRole,
};
use crate::store::{CredentialStore, InventoryStore};
use crate::utils::{AppError, AppResult};

/// In-process backend with the same locking contract as [`super::PgStore`].
///
/// Committed rows live behind short-lived std mutexes; the row lock itself is a
/// per-ticket `tokio::sync::Mutex` whose owned guard travels inside [`MemoryTx`]
/// until commit or rollback.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Mutex<HashMap<Uuid, User>>,
    events: Mutex<HashMap<Uuid, Event>>,
    tickets: Mutex<HashMap<Uuid, Ticket>>,
    row_locks: Mutex<HashMap<Uuid, Arc<RowLock<()>>>>,
    lock_timeout: Option<Duration>,
}

pub struct MemoryTx {
    held: HashMap<Uuid, OwnedMutexGuard<()>>,
    staged: HashMap<Uuid, Ticket>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                lock_timeout: Some(lock_timeout),
                ..Inner::default()
            }),
        }
    }

    fn row_lock(&self, ticket_id: Uuid) -> Option<Arc<RowLock<()>>> {
        guard(&self.inner.row_locks).get(&ticket_id).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(guard(&self.inner.users)
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(guard(&self.inner.users).get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> AppResult<User> {
        let mut users = guard(&self.inner.users);
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            phone_number: user.phone_number,
            role: user.role,
            is_active: true,
            active_token_hash: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_token_fingerprint(
        &self,
        user_id: Uuid,
        fingerprint: Option<&str>,
    ) -> AppResult<()> {
        let mut users = guard(&self.inner.users);
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", user_id)))?;
        user.active_token_hash = fingerprint.map(str::to_string);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn list_users(&self, offset: i64, limit: i64) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = guard(&self.inner.users).values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(users.into_iter().skip(offset).take(limit).collect())
    }

    async fn set_role(&self, user_id: Uuid, role: UserRole) -> AppResult<Option<User>> {
        let mut users = guard(&self.inner.users);
        Ok(users.get_mut(&user_id).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn set_active(&self, user_id: Uuid, active: bool) -> AppResult<Option<User>> {
        let mut users = guard(&self.inner.users);
        Ok(users.get_mut(&user_id).map(|user| {
            user.is_active = active;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<Self::Tx> {
        Ok(MemoryTx {
            held: HashMap::new(),
            staged: HashMap::new(),
        })
    }

    async fn lock_ticket(&self, tx: &mut Self::Tx, ticket_id: Uuid) -> AppResult<Option<Ticket>> {
        if let Some(staged) = tx.staged.get(&ticket_id) {
            return Ok(Some(staged.clone()));
        }

        let Some(lock) = self.row_lock(ticket_id) else {
            return Ok(None);
        };

        let held = match self.inner.lock_timeout {
            Some(wait) => tokio::time::timeout(wait, lock.lock_owned())
                .await
                .map_err(|_| {
                    AppError::Busy(format!(
                        "Ticket '{}' is being processed by another request, try again",
                        ticket_id
                    ))
                })?,
            None => lock.lock_owned().await,
        };

        // Re-read under the lock: the previous holder may have changed or deleted it
        let current = guard(&self.inner.tickets).get(&ticket_id).cloned();
        if let Some(ticket) = &current {
            tx.held.insert(ticket_id, held);
            tx.staged.insert(ticket_id, ticket.clone());
        }
        Ok(current)
    }

    async fn update_ticket(
        &self,
        tx: &mut Self::Tx,
        ticket_id: Uuid,
        ownership: Ownership,
    ) -> AppResult<Ticket> {
        let ticket = tx.staged.get_mut(&ticket_id).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "Ticket '{}' updated without holding its row lock",
                ticket_id
            ))
        })?;
        ticket.apply(ownership, Utc::now());
        Ok(ticket.clone())
    }

    async fn commit(&self, tx: Self::Tx) -> AppResult<()> {
        {
            let mut tickets = guard(&self.inner.tickets);
            for (id, staged) in tx.staged {
                if let Some(row) = tickets.get_mut(&id) {
                    *row = staged;
                }
            }
        }
        // Row locks are released only after the writes are visible
        drop(tx.held);
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> AppResult<()> {
        drop(tx);
        Ok(())
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> AppResult<Option<Ticket>> {
        Ok(guard(&self.inner.tickets).get(&ticket_id).cloned())
    }

    async fn create_event(&self, event: &NewEvent) -> AppResult<Event> {
        let now = Utc::now();
        let created = Event {
            id: Uuid::new_v4(),
            name: event.name.clone(),
            date: event.date,
            location: event.location.clone(),
            created_at: now,
        };

        let seats: Vec<Ticket> = (1..=event.total_tickets)
            .map(|position| Ticket {
                id: Uuid::new_v4(),
                event_id: created.id,
                seat_number: seat_label(position),
                price: event.ticket_price,
                status: TicketStatus::Available,
                owner_id: None,
                updated_at: now,
            })
            .collect();

        let mut events = guard(&self.inner.events);
        let mut tickets = guard(&self.inner.tickets);
        let mut locks = guard(&self.inner.row_locks);
        for seat in seats {
            locks.insert(seat.id, Arc::new(RowLock::new(())));
            tickets.insert(seat.id, seat);
        }
        events.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_event(&self, event_id: Uuid) -> AppResult<Option<Event>> {
        Ok(guard(&self.inner.events).get(&event_id).cloned())
    }

    async fn list_tickets(&self, event_id: Uuid) -> AppResult<Vec<Ticket>> {
        let mut seats: Vec<Ticket> = guard(&self.inner.tickets)
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| {
            (a.seat_number.len(), &a.seat_number).cmp(&(b.seat_number.len(), &b.seat_number))
        });
        Ok(seats)
    }

    async fn delete_event(&self, event_id: Uuid) -> AppResult<bool> {
        let mut events = guard(&self.inner.events);
        if events.remove(&event_id).is_none() {
            return Ok(false);
        }

        let mut tickets = guard(&self.inner.tickets);
        let mut locks = guard(&self.inner.row_locks);
        tickets.retain(|id, ticket| {
            let keep = ticket.event_id != event_id;
            if !keep {
                locks.remove(id);
            }
            keep
        });
        Ok(true)
    }
}
