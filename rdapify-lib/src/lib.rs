//! # RDAPify Library
//!
//! An RDAP (Registration Data Access Protocol) client for domain names,
//! IP networks and autonomous systems.
//!
//! Lookups locate the authoritative registry through IANA bootstrap
//! discovery, retry transient failures, normalize the registry's JSON into
//! stable record types, redact personal contact data and cache the result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rdapify_lib::{ClientConfig, RdapClient, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default()
//!         .with_cache(true)
//!         .with_redaction(true)
//!         .with_retry(RetryPolicy::default().with_max_attempts(3));
//!     let client = RdapClient::with_config(config)?;
//!
//!     let response = client.domain("example.com").await?;
//!     if let Some(domain) = response.as_domain() {
//!         println!("Domain: {}", domain.name);
//!         println!("Status: {}", domain.status.join(", "));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Bootstrap discovery**: IANA `dns`, `ipv4`, `ipv6` and `asn` registries
//! - **Retries**: fixed, linear or exponential back-off honoring `Retry-After`
//! - **Normalization**: events, nameservers, registrar and jCard contacts
//! - **Privacy**: personal contact data redacted by default
//! - **Caching**: TTL cache with JSON snapshots for offline use

pub use cache::{CacheEntry, CacheManager, CacheStats};
pub use client::RdapClient;
pub use concurrent::{lookup_concurrently, lookup_stream};
pub use config::{
    load_env_config, parse_duration, ConfigManager, DefaultsConfig, EnvConfig, FileConfig,
    OutputConfig,
};
pub use error::RdapError;
pub use normalize::normalize;
pub use privacy::{Redactor, REDACTED};
pub use protocols::{
    bootstrap_cache_stats, clear_bootstrap_cache, get_all_known_tlds, BootstrapStats,
};
pub use types::{
    AutnumRecord, BackoffStrategy, ClientConfig, Contact, DomainRecord, Event, IpNetworkRecord,
    QueryTarget, QueryType, RdapRecord, RdapResponse, Registrar, ResponseMeta, RetryPolicy,
    DEFAULT_BOOTSTRAP_URL,
};
pub use utils::{parse_target, parse_target_lines, validate_domain};

mod cache;
mod client;
mod concurrent;
mod config;
mod error;
mod normalize;
mod privacy;
mod protocols;
mod types;
mod utils;

pub type Result<T> = std::result::Result<T, RdapError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        features: get_enabled_features(),
    }
}

/// Information about the library build and features
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub features: Vec<&'static str>,
}

/// Cargo features the crate was built with.
///
/// The features only label the build; behavior is chosen per client through
/// `ClientConfig` (`with_bootstrap`, `with_cache`, `with_redaction`).
#[allow(clippy::vec_init_then_push)]
fn get_enabled_features() -> Vec<&'static str> {
    let mut features = Vec::new();

    #[cfg(feature = "bootstrap")]
    features.push("bootstrap");

    #[cfg(feature = "cache")]
    features.push("cache");

    #[cfg(feature = "redaction")]
    features.push("redaction");

    features
}
