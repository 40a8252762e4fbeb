//! Main RDAP client implementation.
//!
//! [`RdapClient`] ties together query parsing, bootstrap discovery, the
//! HTTP fetcher, normalization, redaction and the response cache.

use crate::cache::{CacheManager, CacheStats};
use crate::concurrent::lookup_concurrently;
use crate::error::RdapError;
use crate::normalize::normalize;
use crate::privacy::Redactor;
use crate::protocols::{build_query_url, BootstrapResolver, RdapFetcher};
use crate::types::{ClientConfig, QueryTarget, QueryType, RdapResponse, ResponseMeta};
use crate::utils::parse_target;
use chrono::Utc;
use std::fmt::Display;
use std::time::Instant;
use tracing::{debug, warn};

/// RDAP client with caching, retries and PII redaction.
///
/// # Example
///
/// ```rust,no_run
/// use rdapify_lib::{ClientConfig, RdapClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = RdapClient::with_config(ClientConfig::default().with_cache(true))?;
///     let response = client.domain("example.com").await?;
///     if let Some(domain) = response.as_domain() {
///         println!("Nameservers: {}", domain.nameservers.join(", "));
///     }
///     Ok(())
/// }
/// ```
pub struct RdapClient {
    config: ClientConfig,
    fetcher: RdapFetcher,
    resolver: BootstrapResolver,
    cache: CacheManager,
    redactor: Redactor,
}

impl RdapClient {
    /// Create a client with default configuration.
    pub fn new() -> Result<Self, RdapError> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration.
    ///
    /// When a cache file is configured its snapshot is loaded here. An
    /// unreadable snapshot is logged and otherwise ignored.
    pub fn with_config(config: ClientConfig) -> Result<Self, RdapError> {
        let fetcher = RdapFetcher::new(&config)?;
        let resolver = BootstrapResolver::new(
            fetcher.http_client(),
            &config.bootstrap_base_url,
            config.bootstrap_enabled,
            config.custom_endpoints.clone(),
        );
        let cache = CacheManager::new(config.cache_ttl, config.cache_max_entries);

        if let Some(path) = &config.cache_file {
            match cache.load_from_file(path) {
                Ok(loaded) => debug!(path = %path.display(), loaded, "loaded cache snapshot"),
                Err(e) => warn!(error = %e, "ignoring unreadable cache snapshot"),
            }
        }

        Ok(Self {
            config,
            fetcher,
            resolver,
            cache,
            redactor: Redactor::new(),
        })
    }

    /// Look up a parsed target.
    ///
    /// The lookup process:
    /// 1. Offline mode answers from the cache (even expired entries) or fails
    /// 2. A live cache entry is returned with `meta.cached` set
    /// 3. The RDAP server is located via bootstrap discovery
    /// 4. The document is fetched with retries, normalized and redacted
    /// 5. The redacted response is cached and returned
    pub async fn query(&self, target: QueryTarget) -> Result<RdapResponse, RdapError> {
        let key = target.cache_key();

        if self.config.offline {
            debug!(key = key.as_str(), "offline lookup");
            return self
                .cache
                .get_stale(&key)?
                .map(|hit| self.serve_cached(hit))
                .ok_or_else(|| RdapError::offline_miss(target.to_string()));
        }

        if self.config.cache_enabled {
            if let Some(hit) = self.cache.get(&key)? {
                debug!(key = key.as_str(), "cache hit");
                return Ok(self.serve_cached(hit));
            }
        }

        let started = Instant::now();
        let base_url = self.resolver.resolve(&target).await?;
        let url = build_query_url(&base_url, &target);
        debug!(query = %target, url = url.as_str(), "resolved RDAP endpoint");

        let (mut json, attempts) = self.fetcher.fetch(&url, &target).await?;
        let mut record = normalize(&target, &json)?;

        if self.config.redact_pii {
            let redacted = self.redactor.redact_record(&mut record);
            debug!(query = %target, contacts = redacted, "redacted personal data");
            if self.config.include_raw {
                self.redactor.redact_json(&mut json);
            }
        }

        let response = RdapResponse {
            query: target,
            record,
            meta: ResponseMeta {
                source: url,
                queried_at: Utc::now(),
                cached: false,
                redacted: self.config.redact_pii,
                attempts,
                duration_ms: started.elapsed().as_millis() as u64,
            },
            raw: self.config.include_raw.then_some(json),
        };

        if self.config.cache_enabled {
            self.cache.insert(&key, response.clone())?;
        }

        Ok(response)
    }

    /// Look up anything: IP address, AS number or domain name.
    pub async fn lookup(&self, input: &str) -> Result<RdapResponse, RdapError> {
        self.lookup_as(input, None).await
    }

    /// Look up `input`, interpreting it only as `hint` when one is given.
    pub async fn lookup_as(
        &self,
        input: &str,
        hint: Option<QueryType>,
    ) -> Result<RdapResponse, RdapError> {
        self.query(parse_target(input, hint)?).await
    }

    pub async fn domain(&self, name: &str) -> Result<RdapResponse, RdapError> {
        self.lookup_as(name, Some(QueryType::Domain)).await
    }

    pub async fn ip(&self, address: &str) -> Result<RdapResponse, RdapError> {
        self.lookup_as(address, Some(QueryType::Ip)).await
    }

    /// Look up an autonomous system, given as a number or `AS`-prefixed string.
    pub async fn asn<A: Display>(&self, asn: A) -> Result<RdapResponse, RdapError> {
        self.lookup_as(&asn.to_string(), Some(QueryType::Autnum)).await
    }

    /// Look up many inputs concurrently.
    ///
    /// At most `concurrency` lookups run at once. Results keep the order of
    /// `inputs`, and one failure never aborts the others.
    pub async fn lookup_many(
        &self,
        inputs: &[String],
    ) -> Vec<(String, Result<RdapResponse, RdapError>)> {
        self.lookup_many_as(inputs, None).await
    }

    /// [`lookup_many`](Self::lookup_many) with every input read as `hint`.
    pub async fn lookup_many_as(
        &self,
        inputs: &[String],
        hint: Option<QueryType>,
    ) -> Vec<(String, Result<RdapResponse, RdapError>)> {
        lookup_concurrently(self, inputs, hint, self.config.concurrency).await
    }

    /// Pre-fetch all IANA bootstrap files.
    pub async fn initialize_bootstrap(&self) -> Result<(), RdapError> {
        self.resolver.initialize().await
    }

    pub fn cache_stats(&self) -> Result<CacheStats, RdapError> {
        self.cache.stats()
    }

    pub fn clear_cache(&self) -> Result<(), RdapError> {
        self.cache.clear()
    }

    /// Write the cache snapshot to the configured cache file.
    ///
    /// Returns the number of entries written.
    pub fn persist_cache(&self) -> Result<usize, RdapError> {
        let path = self
            .config
            .cache_file
            .as_ref()
            .ok_or_else(|| RdapError::config("No cache file configured"))?;
        self.cache.save_to_file(path)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Prepare a cache hit for the caller.
    ///
    /// Entries written with redaction off (for example by another process
    /// sharing the cache file) are redacted here when this client redacts.
    fn serve_cached(&self, mut response: RdapResponse) -> RdapResponse {
        if self.config.redact_pii && !response.meta.redacted {
            let redacted = self.redactor.redact_record(&mut response.record);
            if let Some(raw) = response.raw.as_mut() {
                self.redactor.redact_json(raw);
            }
            response.meta.redacted = true;
            debug!(query = %response.query, contacts = redacted, "redacted cached response");
        }
        response.meta.cached = true;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn offline_config() -> ClientConfig {
        ClientConfig::default().with_offline(true)
    }

    #[tokio::test]
    async fn test_invalid_input_fails_before_network() {
        let client = RdapClient::new().unwrap();
        let err = client.lookup("not a domain").await.unwrap_err();
        assert!(matches!(err, RdapError::InvalidQuery { .. }));

        let err = client.ip("example.com").await.unwrap_err();
        assert!(matches!(err, RdapError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_offline_miss() {
        let client = RdapClient::with_config(offline_config()).unwrap();
        let err = client.domain("example.com").await.unwrap_err();
        assert!(matches!(err, RdapError::OfflineMiss { .. }));
        assert!(err.to_string().contains("example.com"));
    }

    #[tokio::test]
    async fn test_asn_accepts_number_and_prefix() {
        let client = RdapClient::with_config(offline_config()).unwrap();
        for input in [client.asn(15169).await, client.asn("AS15169").await] {
            match input.unwrap_err() {
                RdapError::OfflineMiss { query } => assert_eq!(query, "AS15169"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_persist_cache_requires_file() {
        let client = RdapClient::new().unwrap();
        assert!(matches!(
            client.persist_cache().unwrap_err(),
            RdapError::Config { .. }
        ));

        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let client =
            RdapClient::with_config(ClientConfig::default().with_cache_file(&path)).unwrap();
        assert_eq!(client.persist_cache().unwrap(), 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_lookup_many_keeps_order() {
        let client = RdapClient::with_config(offline_config().with_concurrency(2)).unwrap();
        let inputs: Vec<String> = ["a.test", "bad input", "AS1", "192.0.2.1"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let results = client.lookup_many(&inputs).await;
        let order: Vec<&str> = results.iter().map(|(i, _)| i.as_str()).collect();
        assert_eq!(order, vec!["a.test", "bad input", "AS1", "192.0.2.1"]);
        assert!(matches!(
            results[1].1.as_ref().unwrap_err(),
            RdapError::InvalidQuery { .. }
        ));
        assert!(matches!(
            results[2].1.as_ref().unwrap_err(),
            RdapError::OfflineMiss { .. }
        ));
    }
}
