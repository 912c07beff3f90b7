//! Request payloads accepted by the order API

use super::types::PaymentType;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/orders`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Caller-assigned unique order code (max 255 chars)
    pub code: String,
    /// Opaque token resolved by the identity service
    pub user_token: String,
    pub payment_type: PaymentType,
}
