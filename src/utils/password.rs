use crate::error::{AppError, AppResult};
use bcrypt::{DEFAULT_COST, hash, verify};

/// Password strength: 8-128 chars with lower case, upper case and a digit.
pub fn validate_password(password: &str) -> AppResult<()> {
    if password.len() < 8 || password.len() > 128 {
        return Err(AppError::ValidationError(
            "Password must be between 8 and 128 characters".to_string(),
        ));
    }

    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_lowercase || !has_uppercase || !has_digit {
        return Err(AppError::ValidationError(
            "Password must contain upper case, lower case and digits".to_string(),
        ));
    }

    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    verify(password, hash)
        .map_err(|e| AppError::InternalError(format!("Password verification failed: {e}")))
}
