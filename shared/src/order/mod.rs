//! Order types shared between the order server and its clients
//!
//! - Records: persisted orders and their transition history
//! - Types: small-integer enums (state, payment type)
//! - Requests: API payloads

pub mod record;
pub mod request;
pub mod types;

// Re-exports
pub use record::{Order, StateView, Transition};
pub use request::CreateOrderRequest;
pub use types::{InvalidEnumValue, OrderState, PaymentType};
