// ABOUTME: Input validation shared by request handlers
// ABOUTME: Email, password, theme colour and text length checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::OnceLock;

use cpoint_core::constants::limits::MIN_PASSWORD_LEN;
use cpoint_core::errors::{AppError, AppResult};
use regex::Regex;

use super::media::normalize_upload_reference;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

fn color_regex() -> Option<&'static Regex> {
    static COLOR: OnceLock<Option<Regex>> = OnceLock::new();
    COLOR
        .get_or_init(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").ok())
        .as_ref()
}

/// Whether `email` looks like an address
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(email.trim()))
}

/// Trimmed, non-blank value of a required field
///
/// # Errors
///
/// Returns `MissingRequiredField` when absent or blank
pub fn required<'a>(value: Option<&'a str>, field: &str) -> AppResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::missing_field(field))
}

/// Trimmed value, `None` when blank
#[must_use]
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Check a new password and its confirmation
///
/// # Errors
///
/// Returns `InvalidInput` when they differ or the password is too short
pub fn validate_new_password(password: &str, confirm: &str) -> AppResult<()> {
    if password != confirm {
        return Err(AppError::invalid_input("Passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid_input(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Check an optional `#rgb` / `#rrggbb` colour
///
/// # Errors
///
/// Returns `InvalidInput` for anything else
pub fn validate_color(value: Option<&str>, field: &str) -> AppResult<()> {
    match value {
        Some(color) if !color_regex().is_some_and(|re| re.is_match(color)) => Err(
            AppError::invalid_input(format!("{field} must be a hex colour like #1a2b3c")),
        ),
        _ => Ok(()),
    }
}

/// Check a text length in characters
///
/// # Errors
///
/// Returns `InvalidInput` when longer than `max`
pub fn validate_length(value: &str, max: usize, field: &str) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::invalid_input(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Body of a post, reply or message: trimmed text and a normalized media
/// reference, at least one of which must be present
///
/// # Errors
///
/// Returns `MissingRequiredField` when both are blank, or `InvalidInput`
/// when the text is longer than `max_len`
pub fn text_or_image(
    text: Option<&str>,
    image_path: Option<&str>,
    max_len: usize,
) -> AppResult<(Option<String>, Option<String>)> {
    let text = optional(text);
    let image = image_path.and_then(normalize_upload_reference);
    if text.is_none() && image.is_none() {
        return Err(AppError::missing_field("content"));
    }
    if let Some(text) = &text {
        validate_length(text, max_len, "content")?;
    }
    Ok((text, image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("no spaces@x.io"));
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_new_password("secret1", "secret1").is_ok());
        assert!(validate_new_password("secret1", "secret2").is_err());
        assert!(validate_new_password("abc", "abc").is_err());
    }

    #[test]
    fn test_color_validation() {
        assert!(validate_color(Some("#fff"), "text_color").is_ok());
        assert!(validate_color(Some("#A1b2C3"), "text_color").is_ok());
        assert!(validate_color(Some("red"), "text_color").is_err());
        assert!(validate_color(None, "text_color").is_ok());
    }

    #[test]
    fn test_required() {
        assert_eq!(required(Some("  x "), "name").unwrap(), "x");
        assert!(required(Some("   "), "name").is_err());
        assert!(required(None, "name").is_err());
    }

    #[test]
    fn test_text_or_image() {
        let (text, image) = text_or_image(Some(" hi "), None, 10).unwrap();
        assert_eq!(text.as_deref(), Some("hi"));
        assert!(image.is_none());

        let (text, image) = text_or_image(Some(""), Some("/uploads/posts/a.png"), 10).unwrap();
        assert!(text.is_none());
        assert_eq!(image.as_deref(), Some("uploads/posts/a.png"));

        assert!(text_or_image(None, None, 10).is_err());
        assert!(text_or_image(Some("far too long"), None, 5).is_err());
    }
}
