//! Shared types for the order service
//!
//! Wire types used by the order server and its clients: order records,
//! request payloads, and the unified error/response system.

pub mod error;
pub mod order;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use order::{Order, OrderState, PaymentType, StateView, Transition};
