//! RDAPify CLI Application
//!
//! A command-line interface for looking up registration data for domains,
//! IP networks and autonomous systems over RDAP. This binary is a thin layer
//! over the rdapify-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use rdapify_lib::{get_all_known_tlds, load_env_config, parse_duration, parse_target_lines};
use rdapify_lib::{ClientConfig, ConfigManager, EnvConfig, FileConfig, QueryType, RdapClient};
use rdapify_lib::{RdapError, RdapResponse};
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Looked up when no target is given on the command line or in a file.
const DEFAULT_TARGET: &str = "example.com";

/// CLI arguments for rdapify
#[derive(Parser, Debug)]
#[command(name = "rdapify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Look up domains, IP networks and AS numbers over RDAP")]
#[command(
    long_about = "Look up registration data over RDAP (Registration Data Access Protocol).\n\nFinds the authoritative registry through IANA bootstrap, retries transient failures, redacts personal contact data and caches responses for offline use."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domains, IP addresses or AS numbers to look up (default: example.com)
    #[arg(value_name = "TARGETS", help_heading = "Query")]
    pub targets: Vec<String>,

    /// Treat every target as this type instead of auto-detecting
    #[arg(
        short = 't',
        long = "type",
        value_name = "TYPE",
        value_parser = parse_query_type,
        help_heading = "Query"
    )]
    pub query_type: Option<QueryType>,

    /// Input file with targets (one per line, # comments)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Query"
    )]
    pub file: Option<String>,

    /// List TLDs with a known RDAP server and exit
    #[arg(long = "list-tlds", help_heading = "Query")]
    pub list_tlds: bool,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Include the raw RDAP document in JSON output
    #[arg(long = "raw", help_heading = "Output Format")]
    pub raw: bool,

    /// Colored labels in text output
    #[arg(short = 'p', long = "pretty", help_heading = "Output Format")]
    pub pretty: bool,

    /// Do not read or write the response cache
    #[arg(long = "no-cache", help_heading = "Lookup Behavior")]
    pub no_cache: bool,

    /// Show personal contact data instead of redacting it
    #[arg(long = "no-redact", help_heading = "Lookup Behavior")]
    pub no_redact: bool,

    /// Only use built-in and configured endpoints, skip IANA bootstrap
    #[arg(long = "no-bootstrap", help_heading = "Lookup Behavior")]
    pub no_bootstrap: bool,

    /// Answer from the cache file only, never touch the network
    #[arg(long = "offline", help_heading = "Lookup Behavior")]
    pub offline: bool,

    /// Total attempts per lookup, including the first (1-10)
    #[arg(long = "retries", value_name = "N", help_heading = "Lookup Behavior")]
    pub retries: Option<u32>,

    /// Per-request timeout (e.g. 500ms, 10s, 1m)
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Lookup Behavior")]
    pub timeout: Option<String>,

    /// Persist the response cache to this JSON file between runs
    #[arg(long = "cache-file", value_name = "PATH", help_heading = "Lookup Behavior")]
    pub cache_file: Option<PathBuf>,

    /// Max concurrent lookups (default: 10, max: 100)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub concurrency: Option<usize>,

    /// Use a specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Log configuration and lookup progress to stderr
    #[arg(short = 'v', long = "verbose", help_heading = "Debugging")]
    pub verbose: bool,

    /// Log every lookup step to stderr
    #[arg(short = 'd', long = "debug", help_heading = "Debugging")]
    pub debug: bool,
}

/// Output choices resolved from CLI flags, environment and config files.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct OutputSettings {
    json: bool,
    pretty: bool,
}

fn parse_query_type(value: &str) -> Result<QueryType, String> {
    value.parse()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args);

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if args.list_tlds {
        ui::print_tlds(&get_all_known_tlds());
        return;
    }

    match run(args).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Install the stderr tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--debug` and `--verbose` pick the level.
fn init_logging(args: &Args) {
    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rdapify={0},rdapify_lib={0}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.list_tlds {
        return Ok(());
    }

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 100 {
            return Err("Concurrency must be between 1 and 100".to_string());
        }
    }

    if let Some(retries) = args.retries {
        if retries == 0 || retries > 10 {
            return Err("Retries must be between 1 and 10".to_string());
        }
    }

    if let Some(timeout) = &args.timeout {
        if parse_duration(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use a format like '500ms', '5s', '2m'",
                timeout
            ));
        }
    }

    if args.raw && !args.json {
        return Err("--raw only applies to JSON output, add --json".to_string());
    }

    if args.offline && args.no_cache {
        return Err("Cannot combine --offline with --no-cache".to_string());
    }

    Ok(())
}

/// Main lookup logic. Returns whether every lookup succeeded.
async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let file_config = load_file_config(&args, &env_config)?;

    let config = build_config(&args, &file_config, &env_config)?;
    let output = resolve_output(&args, &file_config, &env_config);
    let targets = collect_targets(&args)?;

    info!(
        targets = targets.len(),
        concurrency = config.concurrency,
        cache = config.cache_enabled,
        redact = config.redact_pii,
        offline = config.offline,
        "starting lookups"
    );

    let client = RdapClient::with_config(config)?;

    if output.pretty && !output.json {
        ui::print_header(targets.len(), client.config().concurrency);
    }

    let started = Instant::now();
    let results = client.lookup_many_as(&targets, args.query_type).await;
    let elapsed = started.elapsed();

    let multiple = targets.len() > 1;
    let mut responses: Vec<&RdapResponse> = Vec::new();
    let mut failures = 0usize;

    for (input, result) in &results {
        match result {
            Ok(response) => {
                responses.push(response);
                if !output.json {
                    ui::print_response(response, output.pretty, args.verbose);
                }
            }
            Err(e) => {
                failures += 1;
                report_failure(input, e, multiple);
            }
        }
    }

    if output.json && (multiple || !responses.is_empty()) {
        print_json(&responses, multiple)?;
    }

    if client.config().cache_file.is_some() && client.config().cache_enabled {
        match client.persist_cache() {
            Ok(saved) => debug!(entries = saved, "saved cache snapshot"),
            Err(e) => warn!(error = %e, "could not save cache snapshot"),
        }
    }

    if args.verbose || (output.pretty && !output.json) {
        ui::print_summary(results.len(), failures, elapsed);
    }

    if failures > 0 {
        return Ok(false);
    }

    if !output.json {
        println!("Query completed successfully!");
    }

    Ok(true)
}

fn report_failure(input: &str, error: &RdapError, multiple: bool) {
    if multiple {
        eprintln!("Error: {}: {}", input, error);
    } else {
        eprintln!("Error: {}", error);
    }
}

/// Print one object for a single target, an array otherwise.
fn print_json(
    responses: &[&RdapResponse],
    multiple: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = match responses {
        [single] if !multiple => serde_json::to_string_pretty(single)?,
        _ => serde_json::to_string_pretty(responses)?,
    };
    println!("{}", json);
    Ok(())
}

/// Load the explicit config file (`--config`, then `RDAPIFY_CONFIG`) or
/// fall back to discovery.
fn load_file_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    let explicit = args
        .config
        .as_ref()
        .map(|path| (path, "CLI --config"))
        .or_else(|| env_config.config.as_ref().map(|path| (path, "RDAPIFY_CONFIG")));

    if let Some((path, source)) = explicit {
        info!(path = path.as_str(), source, "using explicit config file");
        let file_config = config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?;
        return Ok(file_config);
    }

    match config_manager.discover_and_load() {
        Ok(file_config) => Ok(file_config),
        Err(e) => {
            warn!(error = %e, "config discovery failed, using defaults");
            Ok(FileConfig::default())
        }
    }
}

/// Layer config file, environment and CLI flags over the defaults.
fn build_config(
    args: &Args,
    file_config: &FileConfig,
    env_config: &EnvConfig,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let config = file_config.apply_to(ClientConfig::default());
    let config = env_config.apply_to(config);
    apply_cli_args_to_config(config, args)
}

/// Apply CLI flags, the highest precedence layer.
///
/// Negative flags only ever switch features off, so leaving a flag out keeps
/// whatever the file or environment chose.
fn apply_cli_args_to_config(
    mut config: ClientConfig,
    args: &Args,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    if args.no_cache {
        config = config.with_cache(false);
    }
    if args.no_redact {
        config = config.with_redaction(false);
    }
    if args.no_bootstrap {
        config = config.with_bootstrap(false);
    }
    if args.offline {
        config = config.with_offline(true);
    }
    if args.raw {
        config = config.with_raw(true);
    }
    if let Some(retries) = args.retries {
        let retry = config.retry.clone().with_max_attempts(retries);
        config = config.with_retry(retry);
    }
    if let Some(timeout) = &args.timeout {
        let timeout = parse_duration(timeout)
            .ok_or_else(|| format!("Invalid timeout '{}'", timeout))?;
        config = config.with_timeout(timeout);
    }
    if let Some(path) = &args.cache_file {
        config = config.with_cache_file(path);
    }
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }

    Ok(config)
}

fn resolve_output(args: &Args, file_config: &FileConfig, env_config: &EnvConfig) -> OutputSettings {
    let file_output = file_config.output.clone().unwrap_or_default();
    let file_json = file_output.format.as_deref().map(|f| f == "json");

    OutputSettings {
        json: args.json || env_config.json.or(file_json).unwrap_or(false),
        pretty: args.pretty || file_output.pretty.unwrap_or(false),
    }
}

/// Targets from the command line followed by those in `--file`.
fn collect_targets(args: &Args) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut targets = args.targets.clone();

    if let Some(path) = &args.file {
        let from_file = read_targets_from_file(path)?;
        info!(path = path.as_str(), count = from_file.len(), "read targets from file");
        targets.extend(from_file);
    }

    if targets.is_empty() && args.file.is_none() {
        targets.push(DEFAULT_TARGET.to_string());
    }

    Ok(targets)
}

fn read_targets_from_file(file_path: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file_path)
        .map_err(|e| format!("Cannot read file '{}': {}", file_path, e))?;

    let targets = parse_target_lines(&content);
    if targets.is_empty() {
        return Err(format!("No targets found in '{}'", file_path).into());
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdapify_lib::OutputConfig;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_test_args() -> Args {
        Args::parse_from(["rdapify"])
    }

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::parse_from([
            "rdapify",
            "example.com",
            "8.8.8.8",
            "-t",
            "ip",
            "--json",
            "--raw",
            "--retries",
            "5",
            "--timeout",
            "2s",
            "-c",
            "4",
        ]);
        assert_eq!(args.targets, vec!["example.com", "8.8.8.8"]);
        assert_eq!(args.query_type, Some(QueryType::Ip));
        assert!(args.json && args.raw);
        assert_eq!(args.retries, Some(5));
        assert_eq!(args.concurrency, Some(4));
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_unknown_query_type_rejected_by_parser() {
        assert!(Args::try_parse_from(["rdapify", "-t", "mx", "example.com"]).is_err());
    }

    #[test]
    fn test_validate_args_defaults_ok() {
        assert!(validate_args(&create_test_args()).is_ok());
    }

    #[test]
    fn test_validate_args_concurrency_bounds() {
        let mut args = create_test_args();
        args.concurrency = Some(0);
        assert!(validate_args(&args).unwrap_err().contains("Concurrency"));

        args.concurrency = Some(101);
        assert!(validate_args(&args).is_err());

        args.concurrency = Some(100);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_retries_and_timeout() {
        let mut args = create_test_args();
        args.retries = Some(11);
        assert!(validate_args(&args).unwrap_err().contains("Retries"));

        args.retries = Some(3);
        args.timeout = Some("soon".to_string());
        assert!(validate_args(&args).unwrap_err().contains("Invalid timeout"));

        args.timeout = Some("750ms".to_string());
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_flag_conflicts() {
        let mut args = create_test_args();
        args.raw = true;
        assert!(validate_args(&args).unwrap_err().contains("--raw"));

        let mut args = create_test_args();
        args.offline = true;
        args.no_cache = true;
        assert!(validate_args(&args).unwrap_err().contains("--offline"));
    }

    #[test]
    fn test_list_tlds_skips_validation() {
        let mut args = create_test_args();
        args.list_tlds = true;
        args.concurrency = Some(0);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_cli_flags_override_config() {
        let mut args = create_test_args();
        args.no_cache = true;
        args.no_redact = true;
        args.retries = Some(1);
        args.timeout = Some("3s".to_string());
        args.concurrency = Some(7);

        let config = apply_cli_args_to_config(ClientConfig::default(), &args).unwrap();
        assert!(!config.cache_enabled);
        assert!(!config.redact_pii);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.concurrency, 7);
    }

    #[test]
    fn test_absent_flags_preserve_config() {
        let args = create_test_args();
        let config = ClientConfig::default()
            .with_redaction(false)
            .with_concurrency(42);

        let config = apply_cli_args_to_config(config, &args).unwrap();
        assert!(!config.redact_pii, "redaction off from config should stay off");
        assert_eq!(config.concurrency, 42);
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let file_config: FileConfig = toml::from_str(
            r#"
            [defaults]
            concurrency = 5
            retries = 2
            timeout = "20s"
            "#,
        )
        .unwrap();
        let env_config = EnvConfig {
            concurrency: Some(8),
            ..EnvConfig::default()
        };
        let mut args = create_test_args();
        args.retries = Some(4);

        let config = build_config(&args, &file_config, &env_config).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_resolve_output_layers() {
        let file_config = FileConfig {
            output: Some(OutputConfig {
                format: Some("json".to_string()),
                pretty: Some(true),
            }),
            ..FileConfig::default()
        };
        let args = create_test_args();

        let output = resolve_output(&args, &file_config, &EnvConfig::default());
        assert!(output.json && output.pretty);

        let env_config = EnvConfig {
            json: Some(false),
            ..EnvConfig::default()
        };
        let output = resolve_output(&args, &file_config, &env_config);
        assert!(!output.json);

        let mut args = create_test_args();
        args.json = true;
        let output = resolve_output(&args, &FileConfig::default(), &env_config);
        assert!(output.json);
    }

    #[test]
    fn test_collect_targets_defaults_to_example() {
        let targets = collect_targets(&create_test_args()).unwrap();
        assert_eq!(targets, vec![DEFAULT_TARGET]);
    }

    #[test]
    fn test_collect_targets_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# registries").unwrap();
        writeln!(file, "example.org").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "AS15169  # google").unwrap();

        let mut args = create_test_args();
        args.targets = vec!["example.com".to_string()];
        args.file = Some(file.path().to_string_lossy().to_string());

        let targets = collect_targets(&args).unwrap();
        assert_eq!(targets, vec!["example.com", "example.org", "AS15169"]);
    }

    #[test]
    fn test_collect_targets_empty_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here").unwrap();

        let mut args = create_test_args();
        args.file = Some(file.path().to_string_lossy().to_string());

        let err = collect_targets(&args).unwrap_err();
        assert!(err.to_string().contains("No targets"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let mut args = create_test_args();
        args.file = Some("/nonexistent/targets.txt".to_string());
        assert!(collect_targets(&args).unwrap_err().to_string().contains("Cannot read"));
    }
}
