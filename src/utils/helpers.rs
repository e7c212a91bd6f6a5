//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use std::sync::OnceLock;
use chrono::{DateTime, Utc};
use regex::Regex;
use crate::utils::errors::{MaabaraError, Result};

/// Kenyan mobile numbers: optional country code or trunk zero, then a
/// 9-digit subscriber number starting with 7 or 1.
fn phone_regex() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| {
        Regex::new(r"^(?:\+?254|0)?([17]\d{8})$").expect("phone pattern is valid")
    })
}

/// Normalize a phone number to the `254XXXXXXXXX` form M-Pesa expects
pub fn normalize_phone(input: &str) -> Result<String> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '(' && *c != ')')
        .collect();

    if compact.is_empty() {
        return Err(MaabaraError::InvalidInput("Phone number is required".to_string()));
    }

    phone_regex()
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .map(|subscriber| format!("254{}", subscriber.as_str()))
        .ok_or_else(|| MaabaraError::InvalidInput(format!("Invalid phone number: {}", input.trim())))
}

/// Generate a human-friendly reference such as `MB-7KQ2X9PA`
pub fn generate_reference(prefix: &str) -> String {
    use rand::Rng;
    // No 0/O/1/I so references survive being read over the phone
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();

    let code: String = (0..8)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();

    format!("{}-{}", prefix, code)
}

/// Build a URL slug from a display name
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;

    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    slug.trim_end_matches('-').to_string()
}

/// Mask a secret for display, keeping the last four characters
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= 4 {
        return "*".repeat(count);
    }

    let visible: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), visible)
}

/// True when a value came back from [`mask_secret`] and should not overwrite the stored secret
pub fn is_masked(value: &str) -> bool {
    value.starts_with('*')
}

/// Validate email format (basic validation)
pub fn is_valid_email(email: &str) -> bool {
    email.parse::<lettre::Address>().is_ok()
}

/// Case-insensitive `LIKE` pattern matching `term` literally, `None` for a blank term
pub fn like_pattern(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    Some(format!("%{}%", escaped))
}

/// Calculate pagination offset, saturating at `i64::MAX` instead of overflowing
pub fn calculate_offset(page: usize, page_size: usize) -> i64 {
    page.saturating_sub(1)
        .checked_mul(page_size)
        .and_then(|offset| i64::try_from(offset).ok())
        .unwrap_or(i64::MAX)
}

/// Format a timestamp for display
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Format a date the way certificates print it, e.g. `14 March 2025`
pub fn format_long_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%-d %B %Y").to_string()
}

/// Truncate text to a maximum number of characters with ellipsis
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_normalize_phone_accepted_formats() {
        assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("+254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("0112 345 678").unwrap(), "254112345678");
        assert_eq!(normalize_phone("0712-345-678").unwrap(), "254712345678");
    }

    #[test]
    fn test_normalize_phone_required() {
        assert_matches!(
            normalize_phone("   "),
            Err(MaabaraError::InvalidInput(msg)) if msg == "Phone number is required"
        );
    }

    #[test]
    fn test_normalize_phone_rejects_malformed() {
        assert!(normalize_phone("0812345678").is_err());
        assert!(normalize_phone("07123").is_err());
        assert!(normalize_phone("+255712345678").is_err());
        assert!(normalize_phone("07123456789").is_err());
        assert!(normalize_phone("phone").is_err());
    }

    #[test]
    fn test_generate_reference() {
        let reference = generate_reference("MB");
        assert!(reference.starts_with("MB-"));
        assert_eq!(reference.len(), 11);
        assert!(!reference.contains('0') && !reference.contains('O'));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Clinical Skills & CPD"), "clinical-skills-cpd");
        assert_eq!(slugify("  Lab Safety 101 "), "lab-safety-101");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret(""), "");
        assert!(is_masked(&mask_secret("supersecret")));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 8), "hello...");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("  "), None);
        assert_eq!(like_pattern(" nursing "), Some("%nursing%".to_string()));
        assert_eq!(like_pattern("100%_off"), Some("%100\\%\\_off%".to_string()));
    }

    #[test]
    fn test_calculate_offset() {
        assert_eq!(calculate_offset(1, 20), 0);
        assert_eq!(calculate_offset(3, 20), 40);
        assert_eq!(calculate_offset(0, 20), 0);
        assert_eq!(calculate_offset(usize::MAX, 100), i64::MAX);
        assert!(calculate_offset(usize::MAX / 2, 2) >= 0);
    }
}
