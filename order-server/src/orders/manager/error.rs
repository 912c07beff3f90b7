use super::super::storage::StorageError;
use crate::clients::ClientError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Invalid user token")]
    InvalidToken,

    #[error("Order code already exists: {0}")]
    DuplicateCode(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Order already delivered: {0}")]
    NotAllowedDelivered(i64),

    #[error("Order already cancelled: {0}")]
    NotAllowedCancelled(i64),

    #[error("Order modified concurrently: {0}")]
    ConcurrentModification(i64),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Identity service error: {0}")]
    Identity(ClientError),

    #[error("Payment service error: {0}")]
    Payment(ClientError),
}

impl From<StorageError> for ManagerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateCode(code) => ManagerError::DuplicateCode(code),
            StorageError::OrderNotFound(id) => ManagerError::NotFound(id.to_string()),
            other => ManagerError::Storage(other),
        }
    }
}

/// Upstream failures: unreachable services map to a retryable code
fn classify_client_error(e: &ClientError, fallback: ErrorCode) -> ErrorCode {
    match e {
        ClientError::Transport(inner) if inner.is_timeout() => ErrorCode::TimeoutError,
        _ if e.is_unreachable() => ErrorCode::NetworkError,
        _ => fallback,
    }
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::InvalidToken => AppError::new(ErrorCode::TokenInvalid),
            ManagerError::DuplicateCode(code) => {
                AppError::new(ErrorCode::OrderCodeDuplicate).with_detail("code", code)
            }
            ManagerError::NotFound(key) => {
                AppError::new(ErrorCode::OrderNotFound).with_detail("order", key)
            }
            ManagerError::NotAllowedDelivered(id) => {
                AppError::new(ErrorCode::OrderAlreadyDelivered).with_detail("order_id", id)
            }
            ManagerError::NotAllowedCancelled(id) => {
                AppError::new(ErrorCode::OrderAlreadyCancelled).with_detail("order_id", id)
            }
            ManagerError::ConcurrentModification(id) => {
                AppError::new(ErrorCode::OrderConcurrentModification).with_detail("order_id", id)
            }
            ManagerError::Storage(e) => {
                tracing::error!(error = %e, "Storage error occurred");
                AppError::database(e.to_string())
            }
            ManagerError::Identity(e) => {
                let code = classify_client_error(&e, ErrorCode::InternalError);
                tracing::error!(error = %e, error_code = %code, "Identity service call failed");
                AppError::with_message(code, format!("Identity service error: {}", e))
            }
            ManagerError::Payment(e) => {
                let code = classify_client_error(&e, ErrorCode::PaymentFailed);
                tracing::error!(error = %e, error_code = %code, "Payment service call failed");
                AppError::with_message(code, format!("Payment service error: {}", e))
            }
        }
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
