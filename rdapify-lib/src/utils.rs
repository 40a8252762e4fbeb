//! Utility functions for query parsing and validation.
//!
//! This module turns user input into a [`QueryTarget`], detecting whether
//! the input is a domain name, an IP address or an autonomous system number.

use crate::error::RdapError;
use crate::types::{QueryTarget, QueryType};
use lazy_static::lazy_static;
use regex::Regex;
use std::net::IpAddr;

lazy_static! {
    static ref LABEL_RE: Regex = Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$")
        .expect("label pattern is valid");
    static ref ASN_RE: Regex = Regex::new(r"^(?i:as)?([0-9]{1,10})$").expect("asn pattern is valid");
}

/// Parse user input into a lookup target.
///
/// Without a hint the input is tried as an IP address, then as an ASN
/// (`AS15169`, `as15169` or bare digits), then as a domain name.
/// With a hint only that interpretation is attempted.
///
/// # Examples
///
/// ```rust
/// use rdapify_lib::{parse_target, QueryTarget};
///
/// assert_eq!(
///     parse_target("Example.COM.", None).unwrap(),
///     QueryTarget::Domain("example.com".to_string())
/// );
/// assert_eq!(parse_target("AS15169", None).unwrap(), QueryTarget::Autnum(15169));
/// ```
pub fn parse_target(input: &str, hint: Option<QueryType>) -> Result<QueryTarget, RdapError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(RdapError::invalid_query(input, "query cannot be empty"));
    }

    match hint {
        Some(QueryType::Ip) => parse_ip(trimmed).map(QueryTarget::Ip),
        Some(QueryType::Autnum) => parse_asn(trimmed).map(QueryTarget::Autnum),
        Some(QueryType::Domain) => {
            let domain = normalize_domain(trimmed);
            validate_domain(&domain)?;
            Ok(QueryTarget::Domain(domain))
        }
        None => {
            if let Ok(addr) = parse_ip(trimmed) {
                return Ok(QueryTarget::Ip(addr));
            }
            if ASN_RE.is_match(trimmed) {
                return parse_asn(trimmed).map(QueryTarget::Autnum);
            }
            let domain = normalize_domain(trimmed);
            validate_domain(&domain)?;
            Ok(QueryTarget::Domain(domain))
        }
    }
}

/// Parse an IPv4 or IPv6 address, accepting bracketed IPv6 (`[2001:db8::1]`).
pub fn parse_ip(input: &str) -> Result<IpAddr, RdapError> {
    let candidate = input
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    candidate
        .parse::<IpAddr>()
        .map_err(|_| RdapError::invalid_query(input, "not a valid IP address"))
}

/// Parse an autonomous system number with an optional `AS` prefix.
pub fn parse_asn(input: &str) -> Result<u32, RdapError> {
    let caps = ASN_RE
        .captures(input.trim())
        .ok_or_else(|| RdapError::invalid_query(input, "not a valid AS number"))?;

    caps[1]
        .parse::<u32>()
        .map_err(|_| RdapError::invalid_query(input, "AS number out of range (0-4294967295)"))
}

/// Normalize a domain for lookup: trim, drop one trailing dot, lowercase.
pub fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim();
    trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_lowercase()
}

/// Validate a normalized domain name.
///
/// Checks LDH syntax per label (RFC 1035 / RFC 5891 A-labels). Internationalized
/// names must be supplied in punycode (`xn--...`).
///
/// # Returns
///
/// `Ok(())` if valid, `Err(RdapError::InvalidQuery)` if invalid.
pub fn validate_domain(domain: &str) -> Result<(), RdapError> {
    if domain.is_empty() {
        return Err(RdapError::invalid_query(domain, "domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(RdapError::invalid_query(
            domain,
            "domain name exceeds 253 characters",
        ));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(RdapError::invalid_query(
            domain,
            "domain must contain at least one dot",
        ));
    }

    for label in &labels {
        if label.is_empty() {
            return Err(RdapError::invalid_query(domain, "empty label"));
        }
        if label.len() > 63 {
            return Err(RdapError::invalid_query(
                domain,
                format!("label '{}' exceeds 63 characters", label),
            ));
        }
        if !LABEL_RE.is_match(label) {
            return Err(RdapError::invalid_query(
                domain,
                format!(
                    "label '{}' must use letters, digits and inner hyphens only",
                    label
                ),
            ));
        }
    }

    if let Some(tld) = labels.last() {
        if tld.chars().all(|c| c.is_ascii_digit()) {
            return Err(RdapError::invalid_query(domain, "TLD cannot be numeric"));
        }
    }

    Ok(())
}

/// Extract the TLD from a domain name.
///
/// # Returns
///
/// The last label, lowercased, or an error if the domain has no dot.
pub fn extract_tld(domain: &str) -> Result<String, RdapError> {
    let mut parts = domain.rsplitn(2, '.');
    match (parts.next(), parts.next()) {
        (Some(tld), Some(_)) if !tld.is_empty() => Ok(tld.to_lowercase()),
        _ => Err(RdapError::invalid_query(
            domain,
            "domain must contain at least one dot",
        )),
    }
}

/// Read lookup inputs from text: one per line, `#` starts a comment.
pub fn parse_target_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let entry = line.split('#').next().unwrap_or("").trim();
            if entry.is_empty() {
                None
            } else {
                Some(entry.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_autodetect() {
        assert_eq!(
            parse_target("example.com", None).unwrap(),
            QueryTarget::Domain("example.com".to_string())
        );
        assert_eq!(
            parse_target("8.8.8.8", None).unwrap(),
            QueryTarget::Ip("8.8.8.8".parse().unwrap())
        );
        assert_eq!(
            parse_target("[2001:db8::1]", None).unwrap(),
            QueryTarget::Ip("2001:db8::1".parse().unwrap())
        );
        assert_eq!(parse_target("as13335", None).unwrap(), QueryTarget::Autnum(13335));
        assert_eq!(parse_target("64512", None).unwrap(), QueryTarget::Autnum(64512));
    }

    #[test]
    fn test_parse_target_with_hint() {
        assert!(parse_target("example.com", Some(QueryType::Ip)).is_err());
        assert!(parse_target("8.8.8.8", Some(QueryType::Autnum)).is_err());
        assert_eq!(
            parse_target("AS1", Some(QueryType::Autnum)).unwrap(),
            QueryTarget::Autnum(1)
        );
    }

    #[test]
    fn test_parse_asn_range() {
        assert_eq!(parse_asn("4294967295").unwrap(), u32::MAX);
        assert!(parse_asn("4294967296").is_err());
        assert!(parse_asn("ASX").is_err());
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("  Example.COM. "), "example.com");
        assert_eq!(normalize_domain("example.com"), "example.com");
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("sub.example.co.uk").is_ok());
        assert!(validate_domain("xn--bcher-kva.example").is_ok());

        assert!(validate_domain("").is_err());
        assert!(validate_domain("localhost").is_err());
        assert!(validate_domain("-bad.com").is_err());
        assert!(validate_domain("bad-.com").is_err());
        assert!(validate_domain("a..com").is_err());
        assert!(validate_domain("under_score.com").is_err());
        assert!(validate_domain("example.123").is_err());
        assert!(validate_domain(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_extract_tld() {
        assert_eq!(extract_tld("example.com").unwrap(), "com");
        assert_eq!(extract_tld("sub.example.ORG").unwrap(), "org");
        assert!(extract_tld("invalid").is_err());
        assert!(extract_tld("").is_err());
    }

    #[test]
    fn test_parse_target_lines() {
        let content = "example.com\n# comment\n\n8.8.8.8  # google dns\n  AS15169\n";
        assert_eq!(
            parse_target_lines(content),
            vec!["example.com", "8.8.8.8", "AS15169"]
        );
    }
}
