//! Utility functions for domain processing and validation.

use crate::error::ScanError;

/// Normalize a domain for checking: trim, lower-case, drop a trailing root
/// dot, then validate its structure.
pub fn normalize_domain(domain: &str) -> Result<String, ScanError> {
    let normalized = domain.trim().trim_end_matches('.').to_ascii_lowercase();

    if normalized.is_empty() {
        return Err(ScanError::invalid_domain(
            domain,
            "Domain name cannot be empty",
        ));
    }

    if !is_valid_fqdn(&normalized) {
        return Err(ScanError::invalid_domain(
            domain,
            "Not a fully qualified domain name",
        ));
    }

    Ok(normalized)
}

/// Whether an MX pattern from a policy is a wildcard (`*.example.com`).
pub(crate) fn is_wildcard_pattern(pattern: &str) -> bool {
    pattern.starts_with("*.")
}

/// Whether `host` is covered by a policy `mx` pattern. A wildcard stands for
/// exactly one leftmost label.
pub(crate) fn mx_matches_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_lowercase();
    let host = host.trim_end_matches('.').to_lowercase();

    if is_wildcard_pattern(&pattern) {
        match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == &pattern[2..],
            None => false,
        }
    } else {
        pattern == host
    }
}

/// Validate that an FQDN has basic valid structure.
pub(crate) fn is_valid_fqdn(domain: &str) -> bool {
    if domain.len() < 3 || domain.len() > 253 {
        return false;
    }

    if !domain.contains('.') {
        return false;
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    for part in domain.split('.') {
        if part.is_empty() || part.len() > 63 {
            return false;
        }

        // Cannot start or end with hyphen
        if part.starts_with('-') || part.ends_with('-') {
            return false;
        }

        // Underscores show up in real-world hostnames, tolerate them
        if !part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return false;
        }
    }

    true
}
