//! Error handling for RDAP lookups.
//!
//! This module defines a single error type that covers all the different
//! ways a lookup can fail, from invalid input to registry outages.

use std::time::Duration;
use thiserror::Error;

/// Main error type for RDAP operations.
///
/// Every public operation in this crate returns this type so callers can
/// match on the failure mode (for retry decisions, user messages, etc.).
#[derive(Error, Debug, Clone)]
pub enum RdapError {
    /// The query string could not be understood as a domain, IP or ASN
    #[error("Invalid query '{input}': {reason}")]
    InvalidQuery { input: String, reason: String },

    /// The registry answered 404 for this object
    #[error("No RDAP record found for '{query}'")]
    NotFound { query: String },

    /// The registry answered with a non-success HTTP status
    #[error("RDAP server at {url} returned HTTP {status}: {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Connection-level failures (DNS, TLS, refused, reset)
    #[error("Network error: {message}")]
    Network {
        message: String,
        detail: Option<String>,
    },

    /// An operation exceeded its time budget
    #[error("Timeout after {duration:?} during: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// No RDAP service could be located for the resource
    #[error("Bootstrap error for '{resource}': {message}")]
    Bootstrap { resource: String, message: String },

    /// The RDAP payload was not valid or not the expected object class
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Invalid configuration values
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Reading or writing a file failed
    #[error("File error at '{path}': {message}")]
    File { path: String, message: String },

    /// Offline mode is on and nothing is cached for the query
    #[error("Offline mode: no cached response for '{query}'")]
    OfflineMiss { query: String },

    /// Anything else
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RdapError {
    /// Create a new invalid query error.
    pub fn invalid_query<I: Into<String>, R: Into<String>>(input: I, reason: R) -> Self {
        Self::InvalidQuery {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a new not-found error.
    pub fn not_found<Q: Into<String>>(query: Q) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    /// Create a new HTTP status error.
    pub fn http<U: Into<String>, M: Into<String>>(url: U, status: u16, message: M) -> Self {
        Self::Http {
            url: url.into(),
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::Network {
            message: message.into(),
            detail: None,
        }
    }

    /// Create a new network error with detail from the underlying failure.
    pub fn network_with_detail<M: Into<String>, S: Into<String>>(message: M, detail: S) -> Self {
        Self::Network {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new bootstrap error.
    pub fn bootstrap<R: Into<String>, M: Into<String>>(resource: R, message: M) -> Self {
        Self::Bootstrap {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new offline cache miss error.
    pub fn offline_miss<Q: Into<String>>(query: Q) -> Self {
        Self::OfflineMiss {
            query: query.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error suggests the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::Http { status: 429, .. }
                | Self::Http {
                    status: 500..=599,
                    ..
                }
        )
    }

    /// Server-provided back-off hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

// Implement From conversions for common error types
impl From<reqwest::Error> for RdapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request", Duration::from_secs(0))
        } else if err.is_connect() {
            Self::network_with_detail("Connection failed", err.to_string())
        } else if let Some(status) = err.status() {
            Self::http(
                err.url().map(|u| u.to_string()).unwrap_or_default(),
                status.as_u16(),
                err.to_string(),
            )
        } else {
            Self::network_with_detail("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for RdapError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(format!("JSON parsing failed: {}", err))
    }
}

impl From<std::io::Error> for RdapError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("I/O error: {}", err))
    }
}

impl From<toml::de::Error> for RdapError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Failed to parse TOML configuration: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RdapError::network("reset").is_retryable());
        assert!(RdapError::timeout("fetch", Duration::from_secs(1)).is_retryable());
        assert!(RdapError::http("https://x/", 503, "unavailable").is_retryable());
        assert!(RdapError::http("https://x/", 429, "slow down").is_retryable());

        assert!(!RdapError::http("https://x/", 400, "bad request").is_retryable());
        assert!(!RdapError::not_found("example.com").is_retryable());
        assert!(!RdapError::invalid_query("??", "bad").is_retryable());
        assert!(!RdapError::offline_miss("example.com").is_retryable());
    }

    #[test]
    fn test_retry_after_only_on_http() {
        let err = RdapError::Http {
            url: "https://x/".to_string(),
            status: 429,
            message: "slow down".to_string(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(RdapError::network("x").retry_after(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = RdapError::invalid_query("foo", "not a domain");
        assert_eq!(err.to_string(), "Invalid query 'foo': not a domain");

        let err = RdapError::not_found("example.test");
        assert_eq!(err.to_string(), "No RDAP record found for 'example.test'");
        assert_eq!(err.status_code(), Some(404));
    }
}
