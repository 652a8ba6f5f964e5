pub mod error;

pub use error::{AppError, AppResult, AuthError, TokenDecodeError, ValidationError};
