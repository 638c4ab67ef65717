//! DNS-1123 label validation for resource names and namespaces.

/// Maximum length of a DNS-1123 label.
pub const MAX_LABEL_LENGTH: usize = 63;

/// Returns true if `value` is a valid DNS-1123 label.
///
/// A valid label is 1 to 63 characters long, contains only lowercase ASCII
/// alphanumerics and `-`, and starts and ends with an alphanumeric character.
pub fn is_dns1123_label(value: &str) -> bool {
    dns1123_violation(value).is_none()
}

/// Describes why `value` is not a DNS-1123 label, or `None` if it is one.
pub fn dns1123_violation(value: &str) -> Option<String> {
    if value.is_empty() {
        return Some("must not be empty".to_string());
    }

    if value.len() > MAX_LABEL_LENGTH {
        return Some(format!(
            "must be no more than {} characters (got {})",
            MAX_LABEL_LENGTH,
            value.len()
        ));
    }

    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Some(format!(
            "contains '{}'; only lowercase alphanumerics and '-' are allowed",
            c
        ));
    }

    if value.starts_with('-') || value.ends_with('-') {
        return Some("must start and end with an alphanumeric character".to_string());
    }

    None
}
