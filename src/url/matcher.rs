/// Checks if a host matches an allowed-domain pattern
///
/// Supported patterns:
/// 1. Exact: "abs.gov.au" matches only "abs.gov.au"
/// 2. Wildcard: "*.abs.gov.au" matches "abs.gov.au" and any subdomain of it
///
/// A pattern carrying a port ("127.0.0.1:8080") is compared against the
/// candidate's `host:port` form; otherwise the port is ignored.
///
/// # Examples
///
/// ```
/// use gov_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("abs.gov.au", "abs.gov.au"));
/// assert!(!matches_wildcard("abs.gov.au", "data.gov.au"));
///
/// assert!(matches_wildcard("*.abs.gov.au", "abs.gov.au"));
/// assert!(matches_wildcard("*.abs.gov.au", "www.abs.gov.au"));
/// assert!(!matches_wildcard("*.abs.gov.au", "notabs.gov.au"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let candidate = if pattern.contains(':') {
        candidate
    } else {
        strip_port(candidate)
    };

    let candidate = candidate.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        // Wildcard pattern: matches the base domain itself or any subdomain
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Checks if a host equals a suffix or is a subdomain of it ("gov.au" covers "abs.gov.au")
pub fn matches_suffix(suffix: &str, host: &str) -> bool {
    let suffix = suffix.trim_start_matches('.');
    matches_wildcard(&format!("*.{}", suffix), host)
}

fn strip_port(host: &str) -> &str {
    if let Some((h, port)) = host.rsplit_once(':') {
        let numeric = !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit());
        if numeric && (!h.contains(':') || h.ends_with(']')) {
            return h;
        }
    }
    host
}
