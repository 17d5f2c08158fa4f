//! Input validation for API requests.
//!
//! Validation runs before any database work, so malformed requests never
//! reach a lookup. For collecting multiple validation errors and returning
//! them as an ApiError, use the `ValidationErrorBuilder` from the `error`
//! module.

use lazy_static::lazy_static;
use regex::Regex;

/// Required email suffix for every account.
pub const INSTITUTIONAL_DOMAIN: &str = "@vgu.edu.vn";

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 100;
const MAX_SYMPTOMS_LEN: usize = 2000;
const MAX_MESSAGE_LEN: usize = 2000;

lazy_static! {
    /// Regex for a structurally valid email address
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$"
    ).unwrap();

    /// Regex matching HTML/script tags stripped from free-text fields
    static ref MARKUP_REGEX: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Validate email structure. Domain membership is checked separately so
/// signup can distinguish a malformed address from an outside one.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Check that an email belongs to the institutional domain.
pub fn is_institutional_email(email: &str) -> bool {
    email.to_lowercase().ends_with(INSTITUTIONAL_DOMAIN)
}

/// Strip executable markup from a free-text field before storage.
pub fn sanitize_text(text: &str) -> String {
    MARKUP_REGEX.replace_all(text, "").trim().to_string()
}

/// Validate a display name (after sanitization)
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > MAX_NAME_LEN {
        return Err(format!("Name is too long (max {} characters)", MAX_NAME_LEN));
    }

    Ok(())
}

/// Validate an age value
pub fn validate_age(age: i64) -> Result<(), String> {
    if age <= 0 {
        return Err("Age must be greater than zero".to_string());
    }

    if age > 150 {
        return Err("Age is out of range".to_string());
    }

    Ok(())
}

/// Validate a password for signup and password changes
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }

    Ok(())
}

/// Validate appointment symptoms
pub fn validate_symptoms(symptoms: &str) -> Result<(), String> {
    if symptoms.trim().is_empty() {
        return Err("Symptoms are required".to_string());
    }

    if symptoms.len() > MAX_SYMPTOMS_LEN {
        return Err(format!(
            "Symptoms are too long (max {} characters)",
            MAX_SYMPTOMS_LEN
        ));
    }

    Ok(())
}

/// Validate free-text message bodies (advice, report descriptions).
/// Whitespace-only input is rejected.
pub fn validate_message(message: &str, field_name: &str) -> Result<(), String> {
    if message.trim().is_empty() {
        return Err(format!("{} must not be empty", field_name));
    }

    if message.len() > MAX_MESSAGE_LEN {
        return Err(format!(
            "{} is too long (max {} characters)",
            field_name, MAX_MESSAGE_LEN
        ));
    }

    Ok(())
}

/// Validate a scheduled date. Stored as text, so only well-formed RFC 3339
/// timestamps are accepted.
pub fn validate_scheduled_at(value: &str) -> Result<(), String> {
    if chrono::DateTime::parse_from_rfc3339(value).is_err() {
        return Err("Scheduled date must be an RFC 3339 timestamp".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}
