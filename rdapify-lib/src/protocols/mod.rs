//! Protocol plumbing for RDAP lookups.
//!
//! Bootstrap discovery finds the authoritative server for a target,
//! the HTTP layer fetches the RDAP document from it.

/// IANA bootstrap discovery (RFC 9224)
pub mod bootstrap;

/// RDAP transport with retry
pub mod http;

pub use bootstrap::{
    bootstrap_cache_stats, build_query_url, clear_bootstrap_cache, get_all_known_tlds,
    BootstrapResolver, BootstrapStats,
};
pub use http::RdapFetcher;
