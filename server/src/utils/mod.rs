pub mod error;
pub mod extract;
pub mod response;

pub use error::{AppError, AppResult};
pub use extract::{AppForm, AppJson, AppPath, AppQuery};
