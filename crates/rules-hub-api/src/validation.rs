//! Request field validation and normalization shared by the handlers.

use crate::error::ApiError;

pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;

pub const MAX_RULE_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_PATTERN_LEN: usize = 200;
pub const MAX_RULE_CONTENT_LEN: usize = 50_000;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 30;
pub const MAX_LABEL_LEN: usize = 50;

pub const MAX_DISPLAY_NAME_LEN: usize = 50;
pub const MAX_BIO_LEN: usize = 500;
pub const MAX_LINK_LEN: usize = 200;

pub const DEFAULT_PATTERN: &str = "**/*";

pub fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= MAX_EMAIL_LEN
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ApiError::bad_request(format!(
            "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Usernames are lowercase ASCII letters, digits, `_` and `-`.
pub fn is_valid_username(username: &str) -> bool {
    (MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

pub fn normalize_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim().to_lowercase();
    if !is_valid_username(&username) {
        return Err(ApiError::bad_request(format!(
            "Username must be {MIN_USERNAME_LEN}-{MAX_USERNAME_LEN} characters of a-z, 0-9, '_' or '-'"
        )));
    }
    Ok(username)
}

/// Trimmed, non-empty and at most `max` characters.
pub fn required_text(field: &str, raw: &str, max: usize) -> Result<String, ApiError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    check_len(field, value, max)?;
    Ok(value.to_string())
}

/// Trimmed; blank input becomes `None`.
pub fn optional_text(
    field: &str,
    raw: Option<&str>,
    max: usize,
) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            check_len(field, value, max)?;
            Ok(Some(value.to_string()))
        }
    }
}

/// Same as [`optional_text`] but blank text is kept as the empty string.
pub fn bounded_text(field: &str, raw: &str, max: usize) -> Result<String, ApiError> {
    let value = raw.trim();
    check_len(field, value, max)?;
    Ok(value.to_string())
}

pub fn normalize_pattern(raw: Option<&str>) -> Result<String, ApiError> {
    let pattern = optional_text("pattern", raw, MAX_PATTERN_LEN)?;
    Ok(pattern.unwrap_or_else(|| DEFAULT_PATTERN.to_string()))
}

/// Trim, lowercase and deduplicate tags, keeping first-seen order.
pub fn normalize_tags(raw: &[String]) -> Result<Vec<String>, ApiError> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(ApiError::bad_request(format!(
                "Tags must be at most {MAX_TAG_LEN} characters"
            )));
        }
        tags.push(tag);
    }
    if tags.len() > MAX_TAGS {
        return Err(ApiError::bad_request(format!("At most {MAX_TAGS} tags are allowed")));
    }
    Ok(tags)
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased_and_checked() {
        assert_eq!(normalize_email("  Alice@Example.COM ").unwrap(), "alice@example.com");
        let bad_emails = [
            "",
            "alice",
            "@example.com",
            "alice@",
            "alice@example",
            "a b@example.com",
            "a@b@c.com",
        ];
        for bad in bad_emails {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn username_rules() {
        assert_eq!(normalize_username(" Rust_Fan-1 ").unwrap(), "rust_fan-1");
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username("has space").is_err());
        assert!(normalize_username(&"x".repeat(33)).is_err());
        assert!(!is_valid_username("Upper"));
    }

    #[test]
    fn tags_are_deduplicated_in_order() {
        let raw = vec![" Rust ".to_string(), "rust".into(), "".into(), "Async".into()];
        assert_eq!(normalize_tags(&raw).unwrap(), vec!["rust", "async"]);

        let too_many: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();
        assert!(normalize_tags(&too_many).is_err());
        assert!(normalize_tags(&["x".repeat(31)]).is_err());
    }

    #[test]
    fn pattern_defaults_when_blank() {
        assert_eq!(normalize_pattern(None).unwrap(), DEFAULT_PATTERN);
        assert_eq!(normalize_pattern(Some("  ")).unwrap(), DEFAULT_PATTERN);
        assert_eq!(normalize_pattern(Some("src/**/*.ts")).unwrap(), "src/**/*.ts");
    }

    #[test]
    fn required_text_rejects_blank_and_long() {
        assert!(required_text("name", "   ", 10).is_err());
        assert!(required_text("name", "elevenchars", 10).is_err());
        assert_eq!(required_text("name", " ok ", 10).unwrap(), "ok");
        assert_eq!(optional_text("bio", Some(" "), 10).unwrap(), None);
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
    }
}
