pub mod event;
pub mod ticket;
pub mod user;

pub use event::{Event, NewEvent};
pub use ticket::{Ownership, Ticket, TicketStatus};
pub use user::{NewUser, User, UserRole};
