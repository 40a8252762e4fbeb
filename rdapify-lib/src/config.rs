//! Configuration file parsing and management.
//!
//! Settings come from TOML files and `RDAPIFY_*` environment variables and
//! are layered onto a [`ClientConfig`]. Precedence, lowest to highest:
//! built-in defaults, config files, environment, then command-line flags
//! (applied by the caller).

use crate::error::RdapError;
use crate::types::{BackoffStrategy, ClientConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Default values for client and CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// TLD -> RDAP base URL overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<HashMap<String, String>>,

    /// Output formatting preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// HTTP timeout (e.g. "500ms", "10s", "1m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redact_pii: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Total attempts per lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    /// Initial back-off delay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<String>,

    /// "fixed", "linear" or "exponential"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_url: Option<String>,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    /// "text" or "json"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Colored labels in text output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
}

impl FileConfig {
    /// Layer these file settings over `config`.
    ///
    /// Values are expected to have passed [`ConfigManager`] validation;
    /// anything unparseable is skipped.
    pub fn apply_to(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(defaults) = &self.defaults {
            if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_duration) {
                config = config.with_timeout(timeout);
            }
            if let Some(cache) = defaults.cache {
                config = config.with_cache(cache);
            }
            if let Some(redact) = defaults.redact_pii {
                config = config.with_redaction(redact);
            }
            if let Some(bootstrap) = defaults.bootstrap {
                config = config.with_bootstrap(bootstrap);
            }
            if let Some(offline) = defaults.offline {
                config = config.with_offline(offline);
            }
            if let Some(concurrency) = defaults.concurrency {
                config = config.with_concurrency(concurrency);
            }
            if let Some(retries) = defaults.retries {
                config.retry = config.retry.with_max_attempts(retries);
            }
            if let Some(delay) = defaults.retry_delay.as_deref().and_then(parse_duration) {
                config.retry = config.retry.with_initial_delay(delay);
            }
            if let Some(backoff) = defaults
                .backoff
                .as_deref()
                .and_then(|b| b.parse::<BackoffStrategy>().ok())
            {
                config.retry = config.retry.with_backoff(backoff);
            }
            if let Some(ttl) = defaults.cache_ttl.as_deref().and_then(parse_duration) {
                config = config.with_cache_ttl(ttl);
            }
            if let Some(path) = &defaults.cache_file {
                config = config.with_cache_file(expand_home(path));
            }
            if let Some(url) = &defaults.bootstrap_url {
                config = config.with_bootstrap_url(url.clone());
            }
        }

        if let Some(endpoints) = &self.endpoints {
            for (tld, url) in endpoints {
                config = config.with_endpoint(tld.clone(), url.clone());
            }
        }

        config
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, RdapError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RdapError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            RdapError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)?;
        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config, then `~/.rdapify.toml`, then `./rdapify.toml` (or
    /// `./.rdapify.toml`); later files override earlier ones field by field.
    /// Files that fail to parse or validate are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, RdapError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping config file"),
            }
        }

        if self.verbose {
            for path in &loaded_files {
                debug!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./rdapify.toml", "./.rdapify.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".rdapify.toml", "rdapify.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// XDG Base Directory location: `$XDG_CONFIG_HOME/rdapify/config.toml`.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("rdapify").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations. Values from `higher` win.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lo), Some(hi)) => Some(DefaultsConfig {
                    timeout: hi.timeout.or(lo.timeout),
                    cache: hi.cache.or(lo.cache),
                    redact_pii: hi.redact_pii.or(lo.redact_pii),
                    bootstrap: hi.bootstrap.or(lo.bootstrap),
                    offline: hi.offline.or(lo.offline),
                    concurrency: hi.concurrency.or(lo.concurrency),
                    retries: hi.retries.or(lo.retries),
                    retry_delay: hi.retry_delay.or(lo.retry_delay),
                    backoff: hi.backoff.or(lo.backoff),
                    cache_ttl: hi.cache_ttl.or(lo.cache_ttl),
                    cache_file: hi.cache_file.or(lo.cache_file),
                    bootstrap_url: hi.bootstrap_url.or(lo.bootstrap_url),
                }),
                (lo, hi) => hi.or(lo),
            },
            endpoints: match (lower.endpoints, higher.endpoints) {
                (Some(mut lo), Some(hi)) => {
                    lo.extend(hi);
                    Some(lo)
                }
                (lo, hi) => hi.or(lo),
            },
            output: match (lower.output, higher.output) {
                (Some(lo), Some(hi)) => Some(OutputConfig {
                    format: hi.format.or(lo.format),
                    pretty: hi.pretty.or(lo.pretty),
                }),
                (lo, hi) => hi.or(lo),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), RdapError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                if concurrency == 0 || concurrency > 100 {
                    return Err(RdapError::config("Concurrency must be between 1 and 100"));
                }
            }

            if let Some(retries) = defaults.retries {
                if retries == 0 || retries > 10 {
                    return Err(RdapError::config("Retries must be between 1 and 10"));
                }
            }

            for (name, value) in [
                ("timeout", &defaults.timeout),
                ("retry_delay", &defaults.retry_delay),
                ("cache_ttl", &defaults.cache_ttl),
            ] {
                if let Some(value) = value {
                    if parse_duration(value).is_none() {
                        return Err(RdapError::config(format!(
                            "Invalid {} '{}'. Use a format like '500ms', '5s', '2m', '1h'",
                            name, value
                        )));
                    }
                }
            }

            if let Some(backoff) = &defaults.backoff {
                backoff
                    .parse::<BackoffStrategy>()
                    .map_err(RdapError::config)?;
            }

            if let Some(url) = &defaults.bootstrap_url {
                validate_url("bootstrap_url", url)?;
            }
        }

        if let Some(endpoints) = &config.endpoints {
            for (tld, url) in endpoints {
                let tld = tld.trim_start_matches('.');
                if tld.is_empty() || tld.contains(char::is_whitespace) {
                    return Err(RdapError::config(format!(
                        "Invalid endpoint key '{}'",
                        tld
                    )));
                }
                validate_url(&format!("endpoint for '{}'", tld), url)?;
            }
        }

        if let Some(format) = config.output.as_ref().and_then(|o| o.format.as_deref()) {
            if !matches!(format, "text" | "json") {
                return Err(RdapError::config(format!(
                    "Invalid output format '{}', expected 'text' or 'json'",
                    format
                )));
            }
        }

        Ok(())
    }
}

fn validate_url(name: &str, url: &str) -> Result<(), RdapError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(RdapError::config(format!(
            "Invalid {} '{}': must start with http:// or https://",
            name, url
        )))
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), env::var_os("HOME")) {
        (Some(rest), Some(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// Read from `RDAPIFY_*` variables. Invalid values are logged and ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub timeout: Option<Duration>,
    pub cache: Option<bool>,
    pub redact: Option<bool>,
    pub bootstrap: Option<bool>,
    pub offline: Option<bool>,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    pub cache_file: Option<PathBuf>,
    pub bootstrap_url: Option<String>,
    pub config: Option<String>,
    pub json: Option<bool>,
}

/// Load configuration from the process environment.
pub fn load_env_config() -> EnvConfig {
    EnvConfig::from_lookup(|name| env::var(name).ok())
}

impl EnvConfig {
    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| {
            let value = lookup(name)?;
            let parsed = parse_bool(&value);
            if parsed.is_none() {
                warn!("Invalid {}='{}', use true/false", name, value);
            }
            parsed
        };
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut env_config = EnvConfig {
            cache: flag("RDAPIFY_CACHE"),
            redact: flag("RDAPIFY_REDACT"),
            bootstrap: flag("RDAPIFY_BOOTSTRAP"),
            offline: flag("RDAPIFY_OFFLINE"),
            json: flag("RDAPIFY_JSON"),
            cache_file: text("RDAPIFY_CACHE_FILE").map(|p| expand_home(&p)),
            config: text("RDAPIFY_CONFIG"),
            ..Default::default()
        };

        if let Some(val) = lookup("RDAPIFY_TIMEOUT") {
            env_config.timeout = parse_duration(&val);
            if env_config.timeout.is_none() {
                warn!(
                    "Invalid RDAPIFY_TIMEOUT='{}', use a format like '500ms', '5s', '2m'",
                    val
                );
            }
        }

        if let Some(val) = lookup("RDAPIFY_CONCURRENCY") {
            match val.trim().parse::<usize>() {
                Ok(n) if (1..=100).contains(&n) => env_config.concurrency = Some(n),
                _ => warn!("Invalid RDAPIFY_CONCURRENCY='{}', must be 1-100", val),
            }
        }

        if let Some(val) = lookup("RDAPIFY_RETRIES") {
            match val.trim().parse::<u32>() {
                Ok(n) if (1..=10).contains(&n) => env_config.retries = Some(n),
                _ => warn!("Invalid RDAPIFY_RETRIES='{}', must be 1-10", val),
            }
        }

        if let Some(url) = text("RDAPIFY_BOOTSTRAP_URL") {
            match validate_url("RDAPIFY_BOOTSTRAP_URL", &url) {
                Ok(()) => env_config.bootstrap_url = Some(url),
                Err(e) => warn!("{}", e),
            }
        }

        env_config
    }

    /// Layer these environment settings over `config`.
    pub fn apply_to(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(cache) = self.cache {
            config = config.with_cache(cache);
        }
        if let Some(redact) = self.redact {
            config = config.with_redaction(redact);
        }
        if let Some(bootstrap) = self.bootstrap {
            config = config.with_bootstrap(bootstrap);
        }
        if let Some(offline) = self.offline {
            config = config.with_offline(offline);
        }
        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(retries) = self.retries {
            config.retry = config.retry.with_max_attempts(retries);
        }
        if let Some(path) = &self.cache_file {
            config = config.with_cache_file(path.clone());
        }
        if let Some(url) = &self.bootstrap_url {
            config = config.with_bootstrap_url(url.clone());
        }
        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a duration like "500ms", "5s", "2m", "1h" or bare seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(s) = value.strip_suffix('s') {
        s.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(m) = value.strip_suffix('m') {
        m.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(h) = value.strip_suffix('h') {
        h.trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("-1s"), None);
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[defaults]
timeout = "3s"
concurrency = 25
retries = 5
backoff = "linear"
redact_pii = false

[endpoints]
test = "http://127.0.0.1:8080/rdap/"

[output]
format = "json"
"#,
        );

        let config = ConfigManager::new(false)
            .load_file(temp_file.path())
            .unwrap();
        let defaults = config.defaults.as_ref().unwrap();
        assert_eq!(defaults.concurrency, Some(25));
        assert_eq!(defaults.redact_pii, Some(false));
        assert_eq!(
            config.output.as_ref().unwrap().format.as_deref(),
            Some("json")
        );

        let client_config = config.apply_to(ClientConfig::default());
        assert_eq!(client_config.timeout, Duration::from_secs(3));
        assert_eq!(client_config.concurrency, 25);
        assert_eq!(client_config.retry.max_attempts, 5);
        assert_eq!(client_config.retry.backoff, BackoffStrategy::Linear);
        assert!(!client_config.redact_pii);
        assert_eq!(
            client_config.custom_endpoints.get("test").map(String::as_str),
            Some("http://127.0.0.1:8080/rdap/")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let manager = ConfigManager::new(false);
        for content in [
            "[defaults]\nconcurrency = 0\n",
            "[defaults]\nretries = 11\n",
            "[defaults]\ntimeout = \"forever\"\n",
            "[defaults]\nbackoff = \"random\"\n",
            "[endpoints]\ncom = \"ftp://rdap.example/\"\n",
            "[output]\nformat = \"csv\"\n",
            "not toml at all [",
        ] {
            let temp_file = write_config(content);
            assert!(
                manager.load_file(temp_file.path()).is_err(),
                "expected rejection of: {}",
                content
            );
        }
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigManager::new(false)
            .load_file("/nonexistent/rdapify.toml")
            .unwrap_err();
        assert!(matches!(err, RdapError::File { .. }));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                concurrency: Some(10),
                timeout: Some("5s".to_string()),
                cache: Some(false),
                ..Default::default()
            }),
            endpoints: Some(HashMap::from([
                ("a".to_string(), "http://a/".to_string()),
                ("b".to_string(), "http://b-old/".to_string()),
            ])),
            ..Default::default()
        };

        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                concurrency: Some(25),
                cache: Some(true),
                ..Default::default()
            }),
            endpoints: Some(HashMap::from([(
                "b".to_string(),
                "http://b-new/".to_string(),
            )])),
            output: Some(OutputConfig {
                pretty: Some(true),
                ..Default::default()
            }),
        };

        let merged = manager.merge_configs(lower, higher);
        let defaults = merged.defaults.unwrap();
        assert_eq!(defaults.concurrency, Some(25));
        assert_eq!(defaults.timeout.as_deref(), Some("5s"));
        assert_eq!(defaults.cache, Some(true));

        let endpoints = merged.endpoints.unwrap();
        assert_eq!(endpoints["a"], "http://a/");
        assert_eq!(endpoints["b"], "http://b-new/");
        assert_eq!(merged.output.unwrap().pretty, Some(true));
    }

    #[test]
    fn test_env_config_parsing() {
        let vars = HashMap::from([
            ("RDAPIFY_TIMEOUT", "750ms"),
            ("RDAPIFY_CACHE", "off"),
            ("RDAPIFY_REDACT", "maybe"),
            ("RDAPIFY_CONCURRENCY", "500"),
            ("RDAPIFY_RETRIES", "4"),
            ("RDAPIFY_JSON", "yes"),
            ("RDAPIFY_BOOTSTRAP_URL", "http://127.0.0.1:9000/"),
            ("RDAPIFY_CONFIG", "  "),
        ]);
        let env_config =
            EnvConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(env_config.timeout, Some(Duration::from_millis(750)));
        assert_eq!(env_config.cache, Some(false));
        assert_eq!(env_config.redact, None);
        assert_eq!(env_config.concurrency, None);
        assert_eq!(env_config.retries, Some(4));
        assert_eq!(env_config.json, Some(true));
        assert_eq!(env_config.config, None);

        let config = env_config.apply_to(ClientConfig::default());
        assert!(!config.cache_enabled);
        assert!(config.redact_pii);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.bootstrap_base_url, "http://127.0.0.1:9000/");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            defaults: Some(DefaultsConfig {
                timeout: Some("30s".to_string()),
                offline: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let env_config = EnvConfig {
            timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        };

        let config = env_config.apply_to(file.apply_to(ClientConfig::default()));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert!(config.offline);
    }
}
