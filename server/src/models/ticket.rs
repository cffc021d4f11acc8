use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Available,
    /// Reserved for soft holds; nothing enters this state yet.
    Locked,
    Sold,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seat_number: String,
    pub price: Decimal,
    pub status: TicketStatus,
    pub owner_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// The (status, owner) pair written by a single ticket transition.
///
/// Constructed only through [`Ownership::sold_to`] and [`Ownership::released`] so
/// that an owner is present exactly when the ticket is sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    status: TicketStatus,
    owner_id: Option<Uuid>,
}

impl Ownership {
    pub fn sold_to(buyer_id: Uuid) -> Self {
        Self {
            status: TicketStatus::Sold,
            owner_id: Some(buyer_id),
        }
    }

    pub fn released() -> Self {
        Self {
            status: TicketStatus::Available,
            owner_id: None,
        }
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

impl Ticket {
    pub fn is_available(&self) -> bool {
        self.status == TicketStatus::Available
    }

    pub fn apply(&mut self, ownership: Ownership, at: DateTime<Utc>) {
        self.status = ownership.status;
        self.owner_id = ownership.owner_id;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_keeps_owner_and_status_in_step() {
        let buyer = Uuid::new_v4();
        let sold = Ownership::sold_to(buyer);
        assert_eq!(sold.status(), TicketStatus::Sold);
        assert_eq!(sold.owner_id(), Some(buyer));

        let released = Ownership::released();
        assert_eq!(released.status(), TicketStatus::Available);
        assert_eq!(released.owner_id(), None);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::Available).unwrap(),
            "\"available\""
        );
        assert_eq!(serde_json::to_string(&TicketStatus::Sold).unwrap(), "\"sold\"");
    }
}
