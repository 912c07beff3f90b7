//! Input validation helpers
//!
//! Shape checks applied at the HTTP boundary before a request reaches the
//! orders manager.

use crate::utils::AppError;
use shared::order::CreateOrderRequest;

/// Order codes are caller-assigned and stored as-is
pub const MAX_CODE_LEN: usize = 255;

/// Opaque user tokens (JWTs included)
pub const MAX_TOKEN_LEN: usize = 4096;

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(AppError::validation(format!(
            "{field} is too long ({len} chars, max {max_len})"
        )));
    }
    Ok(())
}

pub fn validate_create_order(req: &CreateOrderRequest) -> Result<(), AppError> {
    validate_required_text(&req.code, "code", MAX_CODE_LEN)?;
    validate_required_text(&req.user_token, "user_token", MAX_TOKEN_LEN)?;
    Ok(())
}
