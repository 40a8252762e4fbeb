//! Core data types for RDAP lookups.
//!
//! This module defines the query targets, client configuration, retry policy
//! and the normalized record shapes returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default IANA location of the RDAP bootstrap files.
pub const DEFAULT_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/";

/// Kind of RDAP object being looked up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Domain,
    Ip,
    Autnum,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Domain => write!(f, "domain"),
            QueryType::Ip => write!(f, "ip"),
            QueryType::Autnum => write!(f, "autnum"),
        }
    }
}

impl std::str::FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "domain" => Ok(QueryType::Domain),
            "ip" | "ipv4" | "ipv6" => Ok(QueryType::Ip),
            "autnum" | "asn" | "as" => Ok(QueryType::Autnum),
            other => Err(format!(
                "unknown query type '{}', expected domain, ip or autnum",
                other
            )),
        }
    }
}

/// A validated, normalized lookup target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum QueryTarget {
    /// Lowercased domain name without trailing dot
    Domain(String),
    /// IPv4 or IPv6 address
    Ip(IpAddr),
    /// Autonomous system number
    Autnum(u32),
}

impl QueryTarget {
    pub fn query_type(&self) -> QueryType {
        match self {
            QueryTarget::Domain(_) => QueryType::Domain,
            QueryTarget::Ip(_) => QueryType::Ip,
            QueryTarget::Autnum(_) => QueryType::Autnum,
        }
    }

    /// Key used by the response cache, e.g. `domain:example.com`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.query_type(), self)
    }

    /// RDAP path relative to a service base URL (RFC 9082 section 3.1).
    pub fn path(&self) -> String {
        match self {
            QueryTarget::Domain(name) => format!("domain/{}", name),
            QueryTarget::Ip(addr) => format!("ip/{}", addr),
            QueryTarget::Autnum(asn) => format!("autnum/{}", asn),
        }
    }
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTarget::Domain(name) => write!(f, "{}", name),
            QueryTarget::Ip(addr) => write!(f, "{}", addr),
            QueryTarget::Autnum(asn) => write!(f, "AS{}", asn),
        }
    }
}

/// How the wait between retries grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

impl std::str::FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(BackoffStrategy::Fixed),
            "linear" => Ok(BackoffStrategy::Linear),
            "exponential" | "exp" => Ok(BackoffStrategy::Exponential),
            other => Err(format!(
                "unknown backoff '{}', expected fixed, linear or exponential",
                other
            )),
        }
    }
}

/// Retry behaviour for transient RDAP failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Range: 1-10
    pub max_attempts: u32,

    /// Wait before the first retry
    pub initial_delay: Duration,

    /// Upper bound for any single wait, including server `Retry-After` hints
    pub max_delay: Duration,

    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set the number of attempts, clamped to 1-10.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, 10);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Wait before retry number `retry` (1-based), capped at `max_delay`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        let delay = match self.backoff {
            BackoffStrategy::Fixed => Some(self.initial_delay),
            BackoffStrategy::Linear => self.initial_delay.checked_mul(retry),
            BackoffStrategy::Exponential => 2u32
                .checked_pow(retry - 1)
                .and_then(|factor| self.initial_delay.checked_mul(factor)),
        };
        delay.unwrap_or(self.max_delay).min(self.max_delay)
    }
}

/// Configuration for an [`RdapClient`](crate::RdapClient).
///
/// The defaults mirror what most callers want: caching and redaction on,
/// three attempts with exponential back-off, IANA bootstrap enabled.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cache normalized responses in memory
    /// Default: true
    pub cache_enabled: bool,

    /// Replace personal contact data with `REDACTED`
    /// Default: true
    pub redact_pii: bool,

    pub retry: RetryPolicy,

    /// Per-request HTTP timeout
    /// Default: 10 seconds
    pub timeout: Duration,

    /// Whether to consult the IANA bootstrap registry
    /// Default: true
    pub bootstrap_enabled: bool,

    /// Base URL of the bootstrap files (`dns.json`, `ipv4.json`, ...)
    pub bootstrap_base_url: String,

    /// TLD -> RDAP base URL overrides, consulted before anything else
    pub custom_endpoints: HashMap<String, String>,

    /// Serve only from cache, never touch the network
    /// Default: false
    pub offline: bool,

    /// How long cached responses stay fresh
    /// Default: 1 hour
    pub cache_ttl: Duration,

    /// Maximum cached responses before the oldest is evicted
    /// Default: 1000
    pub cache_max_entries: usize,

    /// Optional JSON snapshot of the cache, loaded on start and written by `persist_cache`
    pub cache_file: Option<PathBuf>,

    /// Maximum concurrent lookups in batch operations
    /// Default: 10, Range: 1-100
    pub concurrency: usize,

    /// Keep the (redacted) raw RDAP JSON on each response
    /// Default: false
    pub include_raw: bool,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            redact_pii: true,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(10),
            bootstrap_enabled: true,
            bootstrap_base_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            custom_endpoints: HashMap::new(),
            offline: false,
            cache_ttl: Duration::from_secs(3600),
            cache_max_entries: 1000,
            cache_file: None,
            concurrency: 10,
            include_raw: false,
            user_agent: format!("rdapify/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.redact_pii = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_bootstrap(mut self, enabled: bool) -> Self {
        self.bootstrap_enabled = enabled;
        self
    }

    /// Point bootstrap discovery at a different base URL (mirrors, tests).
    pub fn with_bootstrap_url<S: Into<String>>(mut self, url: S) -> Self {
        self.bootstrap_base_url = url.into();
        self
    }

    /// Route a TLD to a specific RDAP server, bypassing discovery.
    pub fn with_endpoint<T: Into<String>, U: Into<String>>(mut self, tld: T, url: U) -> Self {
        self.custom_endpoints
            .insert(tld.into().trim_start_matches('.').to_lowercase(), url.into());
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_max_entries(mut self, entries: usize) -> Self {
        self.cache_max_entries = entries.max(1);
        self
    }

    pub fn with_cache_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    /// Set batch concurrency, capped at 100 to prevent resource exhaustion.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 100);
        self
    }

    pub fn with_raw(mut self, include_raw: bool) -> Self {
        self.include_raw = include_raw;
        self
    }
}

/// A dated lifecycle event (registration, expiration, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub action: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// A contact flattened out of an RDAP entity and its vCard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// RDAP roles such as `registrant`, `technical`, `abuse`
    pub roles: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// vCard `kind` (`individual`, `org`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Contact {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Sponsoring registrar of a domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Registrar {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iana_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub abuse_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub abuse_phone: Option<String>,
}

/// Normalized RDAP domain object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DomainRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// LDH name, lowercased
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unicode_name: Option<String>,

    pub status: Vec<String>,

    pub nameservers: Vec<String>,

    pub events: Vec<Event>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_changed_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<Registrar>,

    pub contacts: Vec<Contact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnssec_signed: Option<bool>,
}

/// Normalized RDAP IP network object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct IpNetworkRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_handle: Option<String>,

    /// `cidr0` prefixes such as `192.0.2.0/24`
    pub cidrs: Vec<String>,

    pub status: Vec<String>,

    pub events: Vec<Event>,

    pub contacts: Vec<Contact>,
}

/// Normalized RDAP autonomous system number object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AutnumRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_autnum: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_autnum: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub autnum_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    pub status: Vec<String>,

    pub events: Vec<Event>,

    pub contacts: Vec<Contact>,
}

/// Any normalized RDAP object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "objectClassName")]
pub enum RdapRecord {
    #[serde(rename = "domain")]
    Domain(DomainRecord),

    #[serde(rename = "ip network")]
    IpNetwork(IpNetworkRecord),

    #[serde(rename = "autnum")]
    Autnum(AutnumRecord),
}

impl RdapRecord {
    /// Mutable access to the contacts of whichever object this is.
    pub fn contacts_mut(&mut self) -> &mut Vec<Contact> {
        match self {
            RdapRecord::Domain(d) => &mut d.contacts,
            RdapRecord::IpNetwork(n) => &mut n.contacts,
            RdapRecord::Autnum(a) => &mut a.contacts,
        }
    }

    pub fn contacts(&self) -> &[Contact] {
        match self {
            RdapRecord::Domain(d) => &d.contacts,
            RdapRecord::IpNetwork(n) => &n.contacts,
            RdapRecord::Autnum(a) => &a.contacts,
        }
    }
}

/// How a response was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseMeta {
    /// URL the record was fetched from
    pub source: String,

    /// When the registry was queried (not when the cache was read)
    pub queried_at: DateTime<Utc>,

    /// Served from the response cache
    pub cached: bool,

    /// PII redaction was applied
    pub redacted: bool,

    /// HTTP attempts needed, including retries
    pub attempts: u32,

    /// Wall time of the network lookup in milliseconds
    pub duration_ms: u64,
}

/// Result of a successful RDAP lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RdapResponse {
    pub query: QueryTarget,

    pub record: RdapRecord,

    pub meta: ResponseMeta,

    /// Raw RDAP JSON (redacted when redaction is on), only kept on request
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw: Option<serde_json::Value>,
}

impl RdapResponse {
    pub fn as_domain(&self) -> Option<&DomainRecord> {
        match &self.record {
            RdapRecord::Domain(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_ip_network(&self) -> Option<&IpNetworkRecord> {
        match &self.record {
            RdapRecord::IpNetwork(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_autnum(&self) -> Option<&AutnumRecord> {
        match &self.record {
            RdapRecord::Autnum(a) => Some(a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_paths_and_keys() {
        let domain = QueryTarget::Domain("example.com".to_string());
        assert_eq!(domain.path(), "domain/example.com");
        assert_eq!(domain.cache_key(), "domain:example.com");

        let ip = QueryTarget::Ip("192.0.2.1".parse().unwrap());
        assert_eq!(ip.path(), "ip/192.0.2.1");
        assert_eq!(ip.query_type(), QueryType::Ip);

        let asn = QueryTarget::Autnum(15169);
        assert_eq!(asn.path(), "autnum/15169");
        assert_eq!(asn.to_string(), "AS15169");
        assert_eq!(asn.cache_key(), "autnum:AS15169");
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(350));
    }

    #[test]
    fn test_linear_and_fixed_backoff() {
        let linear = RetryPolicy::default()
            .with_backoff(BackoffStrategy::Linear)
            .with_initial_delay(Duration::from_millis(100));
        assert_eq!(linear.delay_for_attempt(3), Duration::from_millis(300));

        let fixed = RetryPolicy::default()
            .with_backoff(BackoffStrategy::Fixed)
            .with_initial_delay(Duration::from_millis(250));
        assert_eq!(fixed.delay_for_attempt(1), fixed.delay_for_attempt(5));
    }

    #[test]
    fn test_retry_attempts_clamped() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryPolicy::default().with_max_attempts(50).max_attempts, 10);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }

    #[test]
    fn test_config_builders() {
        let config = ClientConfig::default()
            .with_concurrency(500)
            .with_endpoint(".Test", "http://localhost:1/")
            .with_cache(false);

        assert_eq!(config.concurrency, 100);
        assert_eq!(
            config.custom_endpoints.get("test").map(String::as_str),
            Some("http://localhost:1/")
        );
        assert!(!config.cache_enabled);
        assert!(config.redact_pii);
    }

    #[test]
    fn test_record_serializes_with_object_class() {
        let record = RdapRecord::Domain(DomainRecord {
            name: "example.com".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["objectClassName"], "domain");
        assert_eq!(json["name"], "example.com");

        let back: RdapRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_query_type_from_str() {
        assert_eq!("ASN".parse::<QueryType>().unwrap(), QueryType::Autnum);
        assert_eq!("ipv6".parse::<QueryType>().unwrap(), QueryType::Ip);
        assert!("nameserver".parse::<QueryType>().is_err());
    }
}
