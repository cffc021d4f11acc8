//! Seat purchase and administrative release.
//!
//! Every transition runs in its own store transaction and holds the row lock
//! of exactly one ticket, so concurrent requests for the same seat serialize on
//! that lock and requests for different seats never contend. The lock lives in
//! the database rather than in this process, which keeps the guarantee intact
//! across server instances.

use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Ownership, Ticket, TicketStatus};
use crate::store::InventoryStore;
use crate::utils::{AppError, AppResult};

pub struct PurchaseEngine<S> {
    store: S,
}

impl<S: InventoryStore> PurchaseEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Sells an available ticket to `buyer_id`.
    ///
    /// Fails with `NotFound` for an unknown ticket, `Conflict` if the ticket is
    /// no longer available and `Busy` if the row lock could not be taken in
    /// time. On failure nothing is written.
    pub async fn purchase(&self, ticket_id: Uuid, buyer_id: Uuid) -> AppResult<Ticket> {
        let sold = self
            .transition(ticket_id, |ticket| {
                if !ticket.is_available() {
                    return Err(AppError::Conflict(
                        "The ticket is no longer available".to_string(),
                    ));
                }
                Ok(Ownership::sold_to(buyer_id))
            })
            .await?;

        info!(%ticket_id, %buyer_id, seat = %sold.seat_number, "Ticket sold");
        Ok(sold)
    }

    /// Returns a sold ticket to the available pool.
    pub async fn release(&self, ticket_id: Uuid) -> AppResult<Ticket> {
        let released = self
            .transition(ticket_id, |ticket| {
                if ticket.status != TicketStatus::Sold {
                    return Err(AppError::Conflict(
                        "The ticket is not sold and cannot be released".to_string(),
                    ));
                }
                Ok(Ownership::released())
            })
            .await?;

        info!(%ticket_id, seat = %released.seat_number, "Ticket released");
        Ok(released)
    }

    async fn transition<F>(&self, ticket_id: Uuid, decide: F) -> AppResult<Ticket>
    where
        F: FnOnce(&Ticket) -> AppResult<Ownership>,
    {
        let mut tx = self.store.begin().await?;

        match self.apply(&mut tx, ticket_id, decide).await {
            Ok(ticket) => {
                // Commit publishes the write and releases the row lock together
                self.store.commit(tx).await?;
                Ok(ticket)
            }
            Err(e) => {
                if let Err(rollback) = self.store.rollback(tx).await {
                    warn!(%ticket_id, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn apply<F>(&self, tx: &mut S::Tx, ticket_id: Uuid, decide: F) -> AppResult<Ticket>
    where
        F: FnOnce(&Ticket) -> AppResult<Ownership>,
    {
        let ticket = self
            .store
            .lock_ticket(tx, ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ticket '{}' not found", ticket_id)))?;

        let ownership = decide(&ticket)?;
        self.store.update_ticket(tx, ticket_id, ownership).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewEvent;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Duration;

    async fn seeded(store: &MemoryStore, seats: u32) -> Vec<Ticket> {
        let event = store
            .create_event(&NewEvent {
                name: "Finals".to_string(),
                date: Utc::now(),
                location: "Stadium".to_string(),
                total_tickets: seats,
                ticket_price: Decimal::new(9900, 2),
            })
            .await
            .unwrap();
        store.list_tickets(event.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_purchase_sets_status_and_owner_together() {
        let store = MemoryStore::new();
        let seat = seeded(&store, 1).await.remove(0);
        let engine = PurchaseEngine::new(store.clone());
        let buyer = Uuid::new_v4();

        let sold = engine.purchase(seat.id, buyer).await.unwrap();
        assert_eq!(sold.status, TicketStatus::Sold);
        assert_eq!(sold.owner_id, Some(buyer));
        assert!(sold.updated_at >= seat.updated_at);

        let stored = store.get_ticket(seat.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Sold);
        assert_eq!(stored.owner_id, Some(buyer));
    }

    #[tokio::test]
    async fn test_unknown_ticket_is_not_found() {
        let engine = PurchaseEngine::new(MemoryStore::new());
        let err = engine
            .purchase(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sold_ticket_keeps_rejecting_buyers() {
        let store = MemoryStore::new();
        let seat = seeded(&store, 1).await.remove(0);
        let engine = PurchaseEngine::new(store.clone());
        let first = Uuid::new_v4();
        engine.purchase(seat.id, first).await.unwrap();

        for _ in 0..2 {
            let err = engine.purchase(seat.id, Uuid::new_v4()).await.unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
        }
        // The same buyer cannot buy it twice either
        assert!(matches!(
            engine.purchase(seat.id, first).await,
            Err(AppError::Conflict(_))
        ));

        let stored = store.get_ticket(seat.id).await.unwrap().unwrap();
        assert_eq!(stored.owner_id, Some(first));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_buyers_yield_exactly_one_sale() {
        const BUYERS: usize = 32;

        let store = MemoryStore::new();
        let seat = seeded(&store, 1).await.remove(0);
        let engine = Arc::new(PurchaseEngine::new(store.clone()));
        let buyers: Vec<Uuid> = (0..BUYERS).map(|_| Uuid::new_v4()).collect();

        let handles: Vec<_> = buyers
            .iter()
            .map(|&buyer| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.purchase(seat.id, buyer).await })
            })
            .collect();

        let mut sold = Vec::new();
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(ticket) => sold.push(ticket),
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(sold.len(), 1);
        assert_eq!(conflicts, BUYERS - 1);

        let winner = sold[0].owner_id.unwrap();
        assert!(buyers.contains(&winner));
        let stored = store.get_ticket(seat.id).await.unwrap().unwrap();
        assert_eq!(stored.owner_id, Some(winner));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_seats_sell_independently() {
        let store = MemoryStore::new();
        let seats = seeded(&store, 8).await;
        let engine = Arc::new(PurchaseEngine::new(store.clone()));

        let handles: Vec<_> = seats
            .iter()
            .map(|seat| {
                let engine = Arc::clone(&engine);
                let id = seat.id;
                tokio::spawn(async move { engine.purchase(id, Uuid::new_v4()).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_busy_lock_fails_without_mutation() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(25));
        let seat = seeded(&store, 1).await.remove(0);
        let engine = PurchaseEngine::new(store.clone());

        let mut holder = store.begin().await.unwrap();
        store.lock_ticket(&mut holder, seat.id).await.unwrap();

        let err = engine.purchase(seat.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));

        store.rollback(holder).await.unwrap();
        let stored = store.get_ticket(seat.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Available);
        assert!(stored.owner_id.is_none());
    }

    #[tokio::test]
    async fn test_waiting_buyer_sees_committed_sale() {
        let store = MemoryStore::new();
        let seat = seeded(&store, 1).await.remove(0);
        let engine = Arc::new(PurchaseEngine::new(store.clone()));

        // Hold the lock, queue a buyer behind it, then commit a sale by hand
        let mut holder = store.begin().await.unwrap();
        store.lock_ticket(&mut holder, seat.id).await.unwrap();

        let waiting = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.purchase(seat.id, Uuid::new_v4()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        let first = Uuid::new_v4();
        store
            .update_ticket(&mut holder, seat.id, Ownership::sold_to(first))
            .await
            .unwrap();
        store.commit(holder).await.unwrap();

        assert!(matches!(
            waiting.await.unwrap(),
            Err(AppError::Conflict(_))
        ));
        let stored = store.get_ticket(seat.id).await.unwrap().unwrap();
        assert_eq!(stored.owner_id, Some(first));
    }

    #[tokio::test]
    async fn test_release_returns_seat_to_pool() {
        let store = MemoryStore::new();
        let seat = seeded(&store, 1).await.remove(0);
        let engine = PurchaseEngine::new(store.clone());

        engine.purchase(seat.id, Uuid::new_v4()).await.unwrap();
        let released = engine.release(seat.id).await.unwrap();
        assert_eq!(released.status, TicketStatus::Available);
        assert!(released.owner_id.is_none());

        // Releasing an available seat is a conflict and changes nothing
        assert!(matches!(
            engine.release(seat.id).await,
            Err(AppError::Conflict(_))
        ));

        let buyer = Uuid::new_v4();
        let resold = engine.purchase(seat.id, buyer).await.unwrap();
        assert_eq!(resold.owner_id, Some(buyer));
    }
}
