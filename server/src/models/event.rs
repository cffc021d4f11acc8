use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// An event together with the uniform block of seats generated for it.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub total_tickets: u32,
    pub ticket_price: Decimal,
}

pub const MAX_SEATS_PER_EVENT: u32 = 50_000;

/// Prices are stored as NUMERIC(12, 2).
const PRICE_SCALE: u32 = 2;
const PRICE_INTEGER_DIGITS: u32 = 10;

impl NewEvent {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Event name must not be empty".to_string());
        }
        if self.location.trim().is_empty() {
            return Err("Event location must not be empty".to_string());
        }
        if self.total_tickets == 0 || self.total_tickets > MAX_SEATS_PER_EVENT {
            return Err(format!(
                "total_tickets must be between 1 and {}",
                MAX_SEATS_PER_EVENT
            ));
        }
        if self.ticket_price.is_sign_negative() {
            return Err("ticket_price must not be negative".to_string());
        }
        if self.ticket_price.normalize().scale() > PRICE_SCALE {
            return Err(format!(
                "ticket_price must have at most {} decimal places",
                PRICE_SCALE
            ));
        }
        if self.ticket_price >= Decimal::from(10_i64.pow(PRICE_INTEGER_DIGITS)) {
            return Err(format!(
                "ticket_price must be below 10^{}",
                PRICE_INTEGER_DIGITS
            ));
        }
        Ok(())
    }
}

pub fn seat_label(position: u32) -> String {
    format!("Seat-{}", position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewEvent {
        NewEvent {
            name: "Concert".to_string(),
            date: Utc::now(),
            location: "Arena".to_string(),
            total_tickets: 10,
            ticket_price: Decimal::new(2500, 2),
        }
    }

    #[test]
    fn test_valid_event_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_or_oversized_seat_count() {
        let mut event = sample();
        event.total_tickets = 0;
        assert!(event.validate().is_err());

        event.total_tickets = MAX_SEATS_PER_EVENT + 1;
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_price_and_blank_name() {
        let mut event = sample();
        event.ticket_price = Decimal::new(-1, 0);
        assert!(event.validate().is_err());

        let mut event = sample();
        event.name = "   ".to_string();
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_price_must_fit_the_stored_precision() {
        let mut event = sample();
        event.ticket_price = Decimal::new(1005, 3);
        assert!(event.validate().is_err());

        // Trailing zeros beyond two places are harmless
        event.ticket_price = Decimal::new(15000, 4);
        assert!(event.validate().is_ok());

        event.ticket_price = Decimal::new(999_999_999_999, 2);
        assert!(event.validate().is_ok());

        event.ticket_price = Decimal::new(10_000_000_000, 0);
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_seat_labels_are_one_based() {
        assert_eq!(seat_label(1), "Seat-1");
        assert_eq!(seat_label(250), "Seat-250");
    }
}
