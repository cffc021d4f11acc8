//! Persistence seams for accounts and inventory.
//!
//! [`PgStore`] is the production backend. [`MemoryStore`] keeps everything in
//! process and emulates row locks with per-ticket async mutexes; it backs the
//! test suite.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Event, NewEvent, NewUser, Ownership, Ticket, User, UserRole};
use crate::utils::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Fails with `Conflict` when the email is already registered.
    async fn insert_user(&self, user: NewUser) -> AppResult<User>;

    /// Overwrites (or clears, with `None`) the stored session fingerprint.
    async fn set_token_fingerprint(&self, user_id: Uuid, fingerprint: Option<&str>)
        -> AppResult<()>;

    async fn list_users(&self, offset: i64, limit: i64) -> AppResult<Vec<User>>;

    async fn set_role(&self, user_id: Uuid, role: UserRole) -> AppResult<Option<User>>;

    async fn set_active(&self, user_id: Uuid, active: bool) -> AppResult<Option<User>>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// An open transaction. Dropping it without commit discards its writes and
    /// releases every row lock it holds.
    type Tx: Send;

    async fn begin(&self) -> AppResult<Self::Tx>;

    /// Takes the exclusive row lock on a ticket and returns its current state,
    /// or `None` if the ticket does not exist. Waits for concurrent holders;
    /// fails with `Busy` once the configured lock wait elapses.
    async fn lock_ticket(&self, tx: &mut Self::Tx, ticket_id: Uuid) -> AppResult<Option<Ticket>>;

    /// Writes status and owner together on a ticket locked by `tx`.
    async fn update_ticket(
        &self,
        tx: &mut Self::Tx,
        ticket_id: Uuid,
        ownership: Ownership,
    ) -> AppResult<Ticket>;

    async fn commit(&self, tx: Self::Tx) -> AppResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> AppResult<()>;

    async fn get_ticket(&self, ticket_id: Uuid) -> AppResult<Option<Ticket>>;

    /// Creates the event and all of its seats in one transaction.
    async fn create_event(&self, event: &NewEvent) -> AppResult<Event>;

    async fn get_event(&self, event_id: Uuid) -> AppResult<Option<Event>>;

    async fn list_tickets(&self, event_id: Uuid) -> AppResult<Vec<Ticket>>;

    /// Deletes the event and its tickets. Returns `false` if nothing was deleted.
    async fn delete_event(&self, event_id: Uuid) -> AppResult<bool>;
}

/// Everything the HTTP layer needs from a backend.
pub trait Store: CredentialStore + InventoryStore + Clone + 'static {}

impl<T> Store for T where T: CredentialStore + InventoryStore + Clone + 'static {}
