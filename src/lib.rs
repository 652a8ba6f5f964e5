pub mod api;
pub mod cli;
pub mod common;
pub mod conf;
pub mod model;
pub mod service;
pub mod util;

#[cfg(test)]
mod test_support;

pub use common::{AppError, AppResult, AuthError, TokenDecodeError, ValidationError};
pub use service::{DashboardAggregator, DashboardView, Gate, Route, SessionManager};
