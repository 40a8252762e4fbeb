//! Text output for the rdapify CLI.
//!
//! Plain mode prints `Label: value` blocks that scripts can grep. `--pretty`
//! colors the labels and adds a header and a summary line. Uses only the
//! `console` crate.

use console::{style, Style};
use rdapify_lib::{AutnumRecord, DomainRecord, IpNetworkRecord, RdapRecord, RdapResponse};
use std::time::Duration;

const UNKNOWN: &str = "unknown";

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a pretty run.
pub fn print_header(target_count: usize, concurrency: usize) {
    println!(
        "{} {} {}",
        style("rdapify").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Looking up {} target{}",
            target_count,
            if target_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );
    println!("{}", style(format!("Concurrency: {}", concurrency)).dim());
    println!();
}

// ── Record blocks ────────────────────────────────────────────────────────────

/// Print one response as a `Label: value` block followed by a blank line.
pub fn print_response(response: &RdapResponse, pretty: bool, verbose: bool) {
    let mut lines = response_lines(response);

    if verbose {
        lines.push(("Source", response.meta.source.clone()));
        if response.meta.cached {
            lines.push(("Cached", "yes".to_string()));
        }
    }

    let label_style = Style::new().cyan().bold();
    for (label, value) in lines {
        let label = format!("{}:", label);
        if pretty {
            println!("{} {}", label_style.apply_to(label), value);
        } else {
            println!("{} {}", label, value);
        }
    }
    println!();
}

/// Labelled lines for a response, in display order.
pub fn response_lines(response: &RdapResponse) -> Vec<(&'static str, String)> {
    match &response.record {
        RdapRecord::Domain(domain) => domain_lines(domain),
        RdapRecord::IpNetwork(network) => network_lines(network),
        RdapRecord::Autnum(autnum) => autnum_lines(autnum),
    }
}

fn domain_lines(domain: &DomainRecord) -> Vec<(&'static str, String)> {
    let registrar = domain
        .registrar
        .as_ref()
        .and_then(|r| r.name.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());

    vec![
        ("Domain", domain.name.clone()),
        ("Status", join_or(&domain.status, "none")),
        ("Nameservers", join_or(&domain.nameservers, "none")),
        ("Registered", or_unknown(&domain.registration_date)),
        ("Expires", or_unknown(&domain.expiration_date)),
        ("Registrar", registrar),
    ]
}

fn network_lines(network: &IpNetworkRecord) -> Vec<(&'static str, String)> {
    let label = if network.cidrs.is_empty() {
        network.handle.clone().unwrap_or_else(|| UNKNOWN.to_string())
    } else {
        network.cidrs.join(", ")
    };

    let range = match (&network.start_address, &network.end_address) {
        (Some(start), Some(end)) => format!("{} - {}", start, end),
        (Some(start), None) => start.clone(),
        _ => UNKNOWN.to_string(),
    };

    vec![
        ("Network", label),
        ("Range", range),
        ("Name", or_unknown(&network.name)),
        ("Country", or_unknown(&network.country)),
    ]
}

fn autnum_lines(autnum: &AutnumRecord) -> Vec<(&'static str, String)> {
    let asn = match (autnum.start_autnum, autnum.end_autnum) {
        (Some(start), Some(end)) if end != start => format!("AS{}-AS{}", start, end),
        (Some(start), _) => format!("AS{}", start),
        _ => autnum.handle.clone().unwrap_or_else(|| UNKNOWN.to_string()),
    };

    vec![
        ("ASN", asn),
        ("Name", or_unknown(&autnum.name)),
        ("Country", or_unknown(&autnum.country)),
    ]
}

fn join_or(values: &[String], empty: &str) -> String {
    if values.is_empty() {
        empty.to_string()
    } else {
        values.join(", ")
    }
}

fn or_unknown(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| UNKNOWN.to_string())
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// One-line run summary on stderr so stdout stays parseable.
pub fn print_summary(total: usize, failed: usize, duration: Duration) {
    let succeeded = total - failed;
    let failed_part = if failed > 0 {
        style(format!("{} failed", failed)).red().bold().to_string()
    } else {
        style("0 failed").dim().to_string()
    };

    eprintln!(
        "{} {} in {:.1}s",
        style(format!("{} of {} succeeded,", succeeded, total)).green(),
        failed_part,
        duration.as_secs_f64(),
    );
}

// ── TLD listing ──────────────────────────────────────────────────────────────

/// Print TLDs with a known RDAP server, several per row.
pub fn print_tlds(tlds: &[String]) {
    let heading = Style::new().yellow().bold();

    println!();
    println!(
        "{} {}",
        heading.apply_to("TLDs with a known RDAP server:"),
        style(format!("({})", tlds.len())).cyan()
    );
    println!();

    for row in tlds.chunks(8) {
        let cells: Vec<String> = row.iter().map(|tld| format!("{:<12}", tld)).collect();
        println!("  {}", cells.join("").trim_end());
    }

    println!();
    println!("Use: rdapify <domain> --no-bootstrap to stay within this list");
}
