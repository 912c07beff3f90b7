//! External collaborator clients
//!
//! - **identity**: resolves an opaque user token to a [`UserIdentity`]
//! - **payment**: starts payment for an order, either request/response
//!   ([`HttpPaymentClient`]) or fire-and-forget ([`QueuedPaymentPublisher`]
//!   drained by [`PaymentDispatcher`])
//!
//! Both are consumed through traits so the orchestrator never depends on the
//! transport.

mod error;
pub mod identity;
pub mod payment;

pub use error::{ClientError, ClientResult};
pub use identity::{HttpIdentityVerifier, IdentityVerifier, UserIdentity};
pub use payment::{
    HttpPaymentClient, PaymentDispatcher, PaymentInitiator, PaymentOutcome, PaymentRequest,
    QueuedPaymentPublisher,
};
