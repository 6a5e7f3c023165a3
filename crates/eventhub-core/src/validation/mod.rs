//! Input validation and sanitization.
//!
//! Every request body is validated here before it reaches the store.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::types::EventDraft;

/// Validation error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty.
    #[error("Field '{0}' is required")]
    Required(&'static str),

    /// Input exceeds maximum allowed length.
    #[error("Field '{field}' exceeds maximum length ({max} bytes, got {actual})")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },

    /// Email address is not well formed.
    #[error("Invalid email address")]
    InvalidEmail,
}

/// Size limits per input field.
pub mod limits {
    /// Maximum event name length.
    pub const MAX_NAME_LENGTH: usize = 200;

    /// Maximum event description length (16KB).
    pub const MAX_DESCRIPTION_LENGTH: usize = 16 * 1024;

    /// Maximum event location length.
    pub const MAX_LOCATION_LENGTH: usize = 500;

    /// Maximum email length (RFC 5321 path limit).
    pub const MAX_EMAIL_LENGTH: usize = 254;

    /// Maximum password length. Bounds the work handed to the hasher.
    pub const MAX_PASSWORD_LENGTH: usize = 1024;
}

/// Validate and sanitize a free-text field.
///
/// Performs:
/// 1. Length check (prevent memory exhaustion)
/// 2. Strip null bytes and control chars (except newlines/tabs)
/// 3. Unicode normalization (NFKC)
/// 4. Trim, then reject if nothing is left or the result is over `max_len`
///
/// # Errors
///
/// Returns `ValidationError::TooLong` if input exceeds `max_len`, or
/// `ValidationError::Required` if it is blank.
pub fn sanitize_text(
    field: &'static str,
    input: &str,
    max_len: usize,
) -> Result<String, ValidationError> {
    if input.len() > max_len {
        return Err(ValidationError::TooLong {
            field,
            max: max_len,
            actual: input.len(),
        });
    }

    let sanitized: String = input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
        .collect();

    let normalized: String = sanitized.nfkc().collect();
    let trimmed = normalized.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }

    // Compatibility decomposition can expand a single code point many times over.
    if trimmed.len() > max_len {
        return Err(ValidationError::TooLong {
            field,
            max: max_len,
            actual: trimmed.len(),
        });
    }

    Ok(trimmed.to_string())
}

/// Validate an event payload, returning the sanitized draft.
///
/// # Errors
///
/// Returns the first field that fails validation.
pub fn validate_event_draft(draft: EventDraft) -> Result<EventDraft, ValidationError> {
    Ok(EventDraft {
        name: sanitize_text("name", &draft.name, limits::MAX_NAME_LENGTH)?,
        description: sanitize_text(
            "description",
            &draft.description,
            limits::MAX_DESCRIPTION_LENGTH,
        )?,
        location: sanitize_text("location", &draft.location, limits::MAX_LOCATION_LENGTH)?,
        date_time: draft.date_time,
    })
}

/// Canonical form of an email address: trimmed and lowercased.
#[must_use]
pub fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address and return its canonical form.
///
/// This is a shape check (one `@`, non-empty local part, dotted domain, no
/// whitespace), not full RFC 5322 parsing.
///
/// # Errors
///
/// Returns `Required`, `TooLong` or `InvalidEmail`.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = canonical_email(email);

    if email.is_empty() {
        return Err(ValidationError::Required("email"));
    }
    if email.len() > limits::MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email",
            max: limits::MAX_EMAIL_LENGTH,
            actual: email.len(),
        });
    }

    let (local, domain) = email.split_once('@').ok_or(ValidationError::InvalidEmail)?;
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');

    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(email)
}

/// Validate a plaintext password before hashing.
///
/// Passwords are not trimmed or normalized; they are hashed as given.
///
/// # Errors
///
/// Returns `Required` if empty or `TooLong` past the hashing bound.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required("password"));
    }
    if password.len() > limits::MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password",
            max: limits::MAX_PASSWORD_LENGTH,
            actual: password.len(),
        });
    }
    Ok(())
}
