pub mod extract;
pub mod password;
pub mod tokens;

pub use extract::{AdminUser, BearerToken, CurrentUser};
pub use tokens::{TokenIssuer, TokenKind, TokenPair};
