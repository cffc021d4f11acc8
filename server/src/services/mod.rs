pub mod purchase;
pub mod session;

pub use purchase::PurchaseEngine;
pub use session::{require_admin, Registration, SessionAuthority};
