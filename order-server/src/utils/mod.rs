//! Shared helpers: logging setup and boundary validation

pub mod logger;
pub mod validation;

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCode};
