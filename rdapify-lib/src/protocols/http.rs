//! HTTP transport for RDAP queries.
//!
//! Wraps a `reqwest::Client` configured for RDAP (RFC 7480) and applies the
//! client's retry policy to transient failures.

use crate::error::RdapError;
use crate::types::{ClientConfig, QueryTarget, RetryPolicy};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

const RDAP_ACCEPT: &str = "application/rdap+json, application/json";

/// Fetches RDAP documents with retry and back-off.
#[derive(Clone)]
pub struct RdapFetcher {
    http_client: reqwest::Client,
    retry: RetryPolicy,
    timeout: Duration,
}

impl RdapFetcher {
    /// Build a fetcher from client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, RdapError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(RDAP_ACCEPT));

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| {
                RdapError::network_with_detail("Failed to create RDAP HTTP client", e.to_string())
            })?;

        Ok(Self {
            http_client,
            retry: config.retry.clone(),
            timeout: config.timeout,
        })
    }

    /// The underlying HTTP client, shared with bootstrap discovery.
    pub fn http_client(&self) -> reqwest::Client {
        self.http_client.clone()
    }

    /// GET `url` and return the JSON body plus the number of attempts made.
    ///
    /// Retryable failures (network, timeout, 429, 5xx) are retried up to
    /// `max_attempts` in total. The wait before each retry is the policy's
    /// back-off delay or the server's `Retry-After`, whichever is longer,
    /// never exceeding `max_delay`.
    pub async fn fetch(
        &self,
        url: &str,
        target: &QueryTarget,
    ) -> Result<(serde_json::Value, u32), RdapError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.fetch_once(url, target).await {
                Ok(json) => return Ok((json, attempt)),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self
                        .retry
                        .delay_for_attempt(attempt)
                        .max(e.retry_after().unwrap_or_default())
                        .min(self.retry.max_delay);

                    warn!(
                        url,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "RDAP request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        target: &QueryTarget,
    ) -> Result<serde_json::Value, RdapError> {
        debug!(url, "sending RDAP request");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "RDAP response received");

        match status {
            StatusCode::OK => response.json::<serde_json::Value>().await.map_err(|e| {
                if e.is_timeout() {
                    RdapError::timeout("RDAP response body", self.timeout)
                } else {
                    RdapError::parse(format!("Invalid RDAP JSON from {}: {}", url, e))
                }
            }),
            StatusCode::NOT_FOUND => Err(RdapError::not_found(target.to_string())),
            code => {
                let retry_after = parse_retry_after(response.headers());
                Err(RdapError::Http {
                    url: url.to_string(),
                    status: code.as_u16(),
                    message: code
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string(),
                    retry_after,
                })
            }
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> RdapError {
        if err.is_timeout() {
            RdapError::timeout("RDAP request", self.timeout)
        } else {
            RdapError::from(err)
        }
    }
}

/// Parse a `Retry-After` header given as delta-seconds or an HTTP date.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = when.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(
            parse_retry_after(&headers_with("7")),
            Some(Duration::from_secs(7))
        );
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
        assert_eq!(parse_retry_after(&headers_with("soon")), None);
    }

    #[test]
    fn test_retry_after_past_date_is_zero() {
        assert_eq!(
            parse_retry_after(&headers_with("Wed, 21 Oct 2015 07:28:00 GMT")),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_fetcher_builds_from_default_config() {
        let fetcher = RdapFetcher::new(&ClientConfig::default()).unwrap();
        assert_eq!(fetcher.retry.max_attempts, 3);
        assert_eq!(fetcher.timeout, Duration::from_secs(10));
    }
}
