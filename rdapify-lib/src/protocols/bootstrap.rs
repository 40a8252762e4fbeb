//! RDAP service discovery via built-in mappings and the IANA bootstrap registry.
//!
//! Domains resolve through custom endpoints, then a small built-in TLD map
//! (which keeps common lookups working without the bootstrap files), then the
//! IANA `dns.json` registry. IP addresses and AS numbers always go through
//! `ipv4.json`, `ipv6.json` and `asn.json` (RFC 9224).

use crate::error::RdapError;
use crate::types::QueryTarget;
use crate::utils::extract_tld;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Bootstrap cache TTL: 24 hours (service URLs rarely change)
const BOOTSTRAP_TTL: Duration = Duration::from_secs(24 * 3600);

/// One of the four IANA bootstrap files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapRegistry {
    Dns,
    Ipv4,
    Ipv6,
    Asn,
}

impl BootstrapRegistry {
    pub fn file_name(&self) -> &'static str {
        match self {
            BootstrapRegistry::Dns => "dns.json",
            BootstrapRegistry::Ipv4 => "ipv4.json",
            BootstrapRegistry::Ipv6 => "ipv6.json",
            BootstrapRegistry::Asn => "asn.json",
        }
    }

    pub fn all() -> [BootstrapRegistry; 4] {
        [
            BootstrapRegistry::Dns,
            BootstrapRegistry::Ipv4,
            BootstrapRegistry::Ipv6,
            BootstrapRegistry::Asn,
        ]
    }

    fn for_target(target: &QueryTarget) -> Self {
        match target {
            QueryTarget::Domain(_) => BootstrapRegistry::Dns,
            QueryTarget::Ip(IpAddr::V4(_)) => BootstrapRegistry::Ipv4,
            QueryTarget::Ip(IpAddr::V6(_)) => BootstrapRegistry::Ipv6,
            QueryTarget::Autnum(_) => BootstrapRegistry::Asn,
        }
    }
}

#[derive(Debug, Clone)]
struct IpRange {
    network: IpAddr,
    prefix_len: u8,
    url: String,
}

#[derive(Debug, Clone)]
struct AsnRange {
    start: u32,
    end: u32,
    url: String,
}

/// Discovered services for one bootstrap source URL.
#[derive(Default)]
struct SourceCache {
    /// DNS label suffix -> RDAP base URL
    dns: HashMap<String, String>,
    ipv4: Vec<IpRange>,
    ipv6: Vec<IpRange>,
    asn: Vec<AsnRange>,
    /// Domain suffixes known to have no RDAP service (negative cache)
    no_rdap: HashSet<String>,
    /// When each registry file was last fetched
    fetched: HashMap<BootstrapRegistry, Instant>,
}

impl SourceCache {
    fn is_stale(&self, registry: BootstrapRegistry) -> bool {
        match self.fetched.get(&registry) {
            Some(t) => t.elapsed() > BOOTSTRAP_TTL,
            None => true,
        }
    }
}

// Keyed by bootstrap base URL so mirrors and test servers never share entries
lazy_static! {
    static ref BOOTSTRAP_CACHE: Mutex<HashMap<String, SourceCache>> = Mutex::new(HashMap::new());
}

fn lock_cache(
) -> Result<std::sync::MutexGuard<'static, HashMap<String, SourceCache>>, RdapError> {
    BOOTSTRAP_CACHE
        .lock()
        .map_err(|_| RdapError::internal("Failed to acquire bootstrap cache lock"))
}

/// Get the built-in RDAP service map for popular TLDs.
///
/// Values are RDAP base URLs; the query path (`domain/<name>`) is appended
/// to them. These entries keep common lookups working when the IANA
/// bootstrap files are unreachable.
pub fn get_builtin_registry_map() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        // Popular gTLDs
        ("com", "https://rdap.verisign.com/com/v1/"),
        ("net", "https://rdap.verisign.com/net/v1/"),
        ("org", "https://rdap.publicinterestregistry.org/rdap/"),
        ("info", "https://rdap.identitydigital.services/rdap/"),
        ("biz", "https://rdap.nic.biz/"),
        // Google TLDs
        ("app", "https://pubapi.registry.google/rdap/"),
        ("dev", "https://pubapi.registry.google/rdap/"),
        ("page", "https://pubapi.registry.google/rdap/"),
        // CentralNic managed gTLDs
        ("xyz", "https://rdap.centralnic.com/xyz/"),
        ("tech", "https://rdap.centralnic.com/tech/"),
        ("online", "https://rdap.centralnic.com/online/"),
        ("site", "https://rdap.centralnic.com/site/"),
        ("website", "https://rdap.centralnic.com/website/"),
        // Other gTLDs
        ("blog", "https://rdap.blog.fury.ca/rdap/"),
        ("shop", "https://rdap.gmoregistry.net/rdap/"),
        ("cloud", "https://rdap.registry.cloud/rdap/"),
        // Identity Digital managed TLDs
        ("ai", "https://rdap.identitydigital.services/rdap/"),
        ("io", "https://rdap.identitydigital.services/rdap/"),
        ("me", "https://rdap.identitydigital.services/rdap/"),
        ("zone", "https://rdap.identitydigital.services/rdap/"),
        ("digital", "https://rdap.identitydigital.services/rdap/"),
        // ccTLDs
        ("us", "https://rdap.nic.us/"),
        ("uk", "https://rdap.nominet.uk/"),
        ("de", "https://rdap.denic.de/"),
        ("ca", "https://rdap.ca.fury.ca/rdap/"),
        ("au", "https://rdap.cctld.au/rdap/"),
        ("fr", "https://rdap.nic.fr/"),
        ("nl", "https://rdap.sidn.nl/"),
        ("br", "https://rdap.registro.br/"),
        ("in", "https://rdap.nixiregistry.in/rdap/"),
        ("tv", "https://rdap.nic.tv/"),
        ("cc", "https://tld-rdap.verisign.com/cc/v1/"),
    ])
}

/// Get all TLDs with a known RDAP service.
///
/// Returns the union of the built-in map and every bootstrap source fetched
/// so far, deduplicated and sorted alphabetically.
pub fn get_all_known_tlds() -> Vec<String> {
    let mut tld_set: HashSet<String> = get_builtin_registry_map()
        .keys()
        .map(|k| k.to_string())
        .collect();

    if let Ok(cache) = BOOTSTRAP_CACHE.lock() {
        for source in cache.values() {
            tld_set.extend(source.dns.keys().filter(|k| !k.contains('.')).cloned());
        }
    }

    let mut tlds: Vec<String> = tld_set.into_iter().collect();
    tlds.sort();
    tlds
}

/// Join an RDAP base URL and a target into the full query URL.
pub fn build_query_url(base_url: &str, target: &QueryTarget) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), target.path())
}

/// Resolves RDAP service URLs for query targets.
#[derive(Clone)]
pub struct BootstrapResolver {
    http_client: reqwest::Client,
    base_url: String,
    enabled: bool,
    custom_endpoints: HashMap<String, String>,
}

impl BootstrapResolver {
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        enabled: bool,
        custom_endpoints: HashMap<String, String>,
    ) -> Self {
        Self {
            http_client,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
            enabled,
            custom_endpoints,
        }
    }

    /// Find the RDAP base URL serving `target`.
    ///
    /// Lookup flow for domains:
    /// 1. Custom endpoints (longest matching label suffix)
    /// 2. Built-in TLD map
    /// 3. Fresh bootstrap cache entry
    /// 4. Negative cache, which skips the network for suffixes known to lack RDAP
    /// 5. Fetch `dns.json` when missing or stale, then re-check
    ///
    /// IP addresses use longest-prefix match and AS numbers range match
    /// against their bootstrap files.
    pub async fn resolve(&self, target: &QueryTarget) -> Result<String, RdapError> {
        match target {
            QueryTarget::Domain(domain) => self.resolve_domain(domain).await,
            QueryTarget::Ip(_) | QueryTarget::Autnum(_) => self.resolve_number(target).await,
        }
    }

    async fn resolve_domain(&self, domain: &str) -> Result<String, RdapError> {
        let suffixes = domain_suffixes(domain);

        // 1. Custom endpoints
        for suffix in &suffixes {
            if let Some(url) = self.custom_endpoints.get(suffix) {
                debug!(domain, suffix = suffix.as_str(), "using custom RDAP endpoint");
                return Ok(url.clone());
            }
        }

        // 2. Built-in registry (instant, offline)
        let tld = extract_tld(domain)?;
        if let Some(url) = get_builtin_registry_map().get(tld.as_str()) {
            return Ok(url.to_string());
        }

        if !self.enabled {
            return Err(RdapError::bootstrap(
                &tld,
                "No known RDAP endpoint and bootstrap disabled",
            ));
        }

        // 3-4. Bootstrap cache and negative cache
        {
            let cache = lock_cache()?;
            if let Some(source) = cache.get(&self.base_url) {
                if !source.is_stale(BootstrapRegistry::Dns) {
                    if let Some(url) = longest_suffix_match(&source.dns, &suffixes) {
                        return Ok(url);
                    }
                    if source.no_rdap.contains(&tld) {
                        return Err(RdapError::bootstrap(
                            &tld,
                            "TLD has no known RDAP endpoint",
                        ));
                    }
                }
            }
        }

        // 5. Fetch and re-check
        if self.needs_fetch(BootstrapRegistry::Dns)? {
            self.fetch_registry(BootstrapRegistry::Dns).await?;
        }

        let mut cache = lock_cache()?;
        let source = cache.entry(self.base_url.clone()).or_default();
        if let Some(url) = longest_suffix_match(&source.dns, &suffixes) {
            return Ok(url);
        }

        source.no_rdap.insert(tld.clone());
        Err(RdapError::bootstrap(
            &tld,
            "TLD not found in IANA bootstrap registry",
        ))
    }

    async fn resolve_number(&self, target: &QueryTarget) -> Result<String, RdapError> {
        if !self.enabled {
            return Err(RdapError::bootstrap(
                target.to_string(),
                "IP and ASN lookups require bootstrap discovery",
            ));
        }

        let registry = BootstrapRegistry::for_target(target);
        if self.needs_fetch(registry)? {
            self.fetch_registry(registry).await?;
        }

        let cache = lock_cache()?;
        let found = cache.get(&self.base_url).and_then(|source| match target {
            QueryTarget::Ip(addr @ IpAddr::V4(_)) => longest_prefix_match(&source.ipv4, addr),
            QueryTarget::Ip(addr @ IpAddr::V6(_)) => longest_prefix_match(&source.ipv6, addr),
            QueryTarget::Autnum(asn) => source
                .asn
                .iter()
                .find(|r| r.start <= *asn && *asn <= r.end)
                .map(|r| r.url.clone()),
            QueryTarget::Domain(_) => None,
        });

        found.ok_or_else(|| {
            RdapError::bootstrap(
                target.to_string(),
                format!("not covered by {}", registry.file_name()),
            )
        })
    }

    fn needs_fetch(&self, registry: BootstrapRegistry) -> Result<bool, RdapError> {
        let cache = lock_cache()?;
        Ok(cache
            .get(&self.base_url)
            .map(|source| source.is_stale(registry))
            .unwrap_or(true))
    }

    /// Pre-warm all four registries.
    ///
    /// Safe to call multiple times; fresh registries (within the 24-hour TTL)
    /// are not fetched again. Individual failures are logged and the first
    /// one is returned after the others have been attempted.
    pub async fn initialize(&self) -> Result<(), RdapError> {
        let mut first_error = None;
        for registry in BootstrapRegistry::all() {
            if !self.needs_fetch(registry)? {
                continue;
            }
            if let Err(e) = self.fetch_registry(registry).await {
                warn!(registry = registry.file_name(), error = %e, "bootstrap prefetch failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Download one bootstrap file and replace its cached services.
    async fn fetch_registry(&self, registry: BootstrapRegistry) -> Result<(), RdapError> {
        let url = format!("{}{}", self.base_url, registry.file_name());
        debug!(url = url.as_str(), "fetching bootstrap registry");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            RdapError::bootstrap(
                registry.file_name(),
                format!("Failed to fetch bootstrap registry: {}", e),
            )
        })?;

        if !response.status().is_success() {
            return Err(RdapError::bootstrap(
                registry.file_name(),
                format!("Bootstrap registry returned HTTP {}", response.status()),
            ));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            RdapError::bootstrap(
                registry.file_name(),
                format!("Failed to parse bootstrap JSON: {}", e),
            )
        })?;

        let services = parse_services(&json)
            .map_err(|message| RdapError::bootstrap(registry.file_name(), message))?;

        let mut cache = lock_cache()?;
        let source = cache.entry(self.base_url.clone()).or_default();

        match registry {
            BootstrapRegistry::Dns => {
                source.dns = services
                    .into_iter()
                    .flat_map(|(keys, url)| {
                        keys.into_iter().map(move |k| {
                            (k.trim_start_matches('.').to_lowercase(), url.clone())
                        })
                    })
                    .collect();
                // Reset negative cache on fresh fetch
                source.no_rdap.clear();
            }
            BootstrapRegistry::Ipv4 | BootstrapRegistry::Ipv6 => {
                let ranges: Vec<IpRange> = services
                    .into_iter()
                    .flat_map(|(keys, url)| {
                        keys.into_iter().filter_map(move |k| {
                            parse_cidr(&k).map(|(network, prefix_len)| IpRange {
                                network,
                                prefix_len,
                                url: url.clone(),
                            })
                        })
                    })
                    .collect();
                if registry == BootstrapRegistry::Ipv4 {
                    source.ipv4 = ranges;
                } else {
                    source.ipv6 = ranges;
                }
            }
            BootstrapRegistry::Asn => {
                source.asn = services
                    .into_iter()
                    .flat_map(|(keys, url)| {
                        keys.into_iter().filter_map(move |k| {
                            parse_asn_range(&k).map(|(start, end)| AsnRange {
                                start,
                                end,
                                url: url.clone(),
                            })
                        })
                    })
                    .collect();
            }
        }
        source.fetched.insert(registry, Instant::now());

        debug!(
            registry = registry.file_name(),
            "bootstrap registry cached"
        );
        Ok(())
    }
}

/// Parse the `services` array of a bootstrap file into `(keys, base_url)` pairs.
///
/// Each service is `[[keys...], [urls...]]`; an `https` URL is preferred.
fn parse_services(json: &serde_json::Value) -> Result<Vec<(Vec<String>, String)>, String> {
    let services = json
        .get("services")
        .and_then(|s| s.as_array())
        .ok_or_else(|| "Invalid bootstrap JSON: missing or invalid 'services' array".to_string())?;

    let mut parsed = Vec::with_capacity(services.len());
    for service in services {
        let Some(pair) = service.as_array().filter(|a| a.len() >= 2) else {
            continue;
        };

        let urls: Vec<&str> = pair[1]
            .as_array()
            .map(|urls| urls.iter().filter_map(|u| u.as_str()).collect())
            .unwrap_or_default();
        let Some(url) = urls
            .iter()
            .find(|u| u.starts_with("https://"))
            .or_else(|| urls.first())
        else {
            continue;
        };

        let keys: Vec<String> = pair[0]
            .as_array()
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| k.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        parsed.push((keys, format!("{}/", url.trim_end_matches('/'))));
    }

    Ok(parsed)
}

/// All label suffixes of a domain, longest first, excluding the full name.
///
/// `a.b.example.co.uk` -> `b.example.co.uk`, `example.co.uk`, `co.uk`, `uk`
fn domain_suffixes(domain: &str) -> Vec<String> {
    let labels: Vec<&str> = domain.split('.').collect();
    (1..labels.len()).map(|i| labels[i..].join(".")).collect()
}

fn longest_suffix_match(map: &HashMap<String, String>, suffixes: &[String]) -> Option<String> {
    suffixes.iter().find_map(|s| map.get(s).cloned())
}

fn longest_prefix_match(ranges: &[IpRange], addr: &IpAddr) -> Option<String> {
    ranges
        .iter()
        .filter(|r| cidr_contains(&r.network, r.prefix_len, addr))
        .max_by_key(|r| r.prefix_len)
        .map(|r| r.url.clone())
}

/// Parse `192.0.2.0/24` or `2001:db8::/32`.
fn parse_cidr(value: &str) -> Option<(IpAddr, u8)> {
    let (addr, len) = value.trim().split_once('/')?;
    let network: IpAddr = addr.parse().ok()?;
    let prefix_len: u8 = len.parse().ok()?;
    let max = if network.is_ipv4() { 32 } else { 128 };
    if prefix_len > max {
        return None;
    }
    Some((network, prefix_len))
}

/// Parse `64512-65534` or a single `15169`.
fn parse_asn_range(value: &str) -> Option<(u32, u32)> {
    match value.trim().split_once('-') {
        Some((start, end)) => {
            let start: u32 = start.trim().parse().ok()?;
            let end: u32 = end.trim().parse().ok()?;
            (start <= end).then_some((start, end))
        }
        None => {
            let single: u32 = value.trim().parse().ok()?;
            Some((single, single))
        }
    }
}

fn cidr_contains(network: &IpAddr, prefix_len: u8, addr: &IpAddr) -> bool {
    match (network, addr) {
        (IpAddr::V4(net), IpAddr::V4(ip)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix_len))
            };
            (u32::from(*net) & mask) == (u32::from(*ip) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(prefix_len))
            };
            (u128::from(*net) & mask) == (u128::from(*ip) & mask)
        }
        _ => false,
    }
}

/// Clear every cached bootstrap source (useful for testing).
pub fn clear_bootstrap_cache() -> Result<(), RdapError> {
    lock_cache()?.clear();
    Ok(())
}

/// Counts of cached bootstrap services across all sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapStats {
    pub sources: usize,
    pub domain_entries: usize,
    pub ip_ranges: usize,
    pub asn_ranges: usize,
}

/// Get bootstrap cache statistics (useful for debugging).
pub fn bootstrap_cache_stats() -> Result<BootstrapStats, RdapError> {
    let cache = lock_cache()?;
    Ok(cache.values().fold(
        BootstrapStats {
            sources: cache.len(),
            ..Default::default()
        },
        |mut stats, source| {
            stats.domain_entries += source.dns.len();
            stats.ip_ranges += source.ipv4.len() + source.ipv6.len();
            stats.asn_ranges += source.asn.len();
            stats
        },
    ))
}
