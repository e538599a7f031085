use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
    })
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?\d{7,15}$").expect("valid phone regex"))
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if !email_regex().is_match(email) {
        return Err(AppError::ValidationError("Invalid email address".to_string()));
    }
    Ok(())
}

/// Loose international format: optional `+` then 7-15 digits.
pub fn validate_phone(phone: &str) -> AppResult<()> {
    if !phone_regex().is_match(phone) {
        return Err(AppError::ValidationError("Invalid phone number".to_string()));
    }
    Ok(())
}

/// Strip spaces, dashes and brackets so equal numbers compare equal.
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

pub fn validate_username(username: &str) -> AppResult<()> {
    let len = username.chars().count();
    if !(2..=32).contains(&len) {
        return Err(AppError::ValidationError(
            "Username length must be between 2 and 32 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jane@example.com").is_ok());
        assert!(validate_email("jane.doe+cars@mail.example.org").is_ok());
        assert!(validate_email("jane@").is_err());
        assert!(validate_email("not an email").is_err());
    }

    #[test]
    fn test_phone() {
        assert_eq!(normalize_phone("+1 (234) 567-8901"), "+12345678901");
        assert!(validate_phone(&normalize_phone("+1 (234) 567-8901")).is_ok());
        assert!(validate_phone("12ab").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("jo").is_ok());
        assert!(validate_username("j").is_err());
    }
}
