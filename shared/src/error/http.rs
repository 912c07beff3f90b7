//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound | Self::OrderNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::OrderCodeDuplicate
            | Self::OrderConcurrentModification => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::TokenInvalid => StatusCode::UNAUTHORIZED,

            // 406 Not Acceptable (terminal orders)
            Self::OrderAlreadyDelivered | Self::OrderAlreadyCancelled => {
                StatusCode::NOT_ACCEPTABLE
            }

            // 502 Bad Gateway (payment service answered badly)
            Self::PaymentFailed => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::NetworkError | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::Unknown | Self::InternalError | Self::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 400 Bad Request
            Self::ValidationFailed | Self::InvalidRequest => StatusCode::BAD_REQUEST,
        }
    }
}
