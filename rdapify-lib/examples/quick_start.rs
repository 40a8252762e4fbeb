//! Quick start: look up one domain with caching, redaction and retries.
//!
//! Run with `cargo run -p rdapify-lib --example quick_start`.

use rdapify_lib::{ClientConfig, RdapClient, RetryPolicy};
use std::process;

#[tokio::main]
async fn main() {
    let config = ClientConfig::default()
        .with_cache(true)
        .with_redaction(true)
        .with_retry(RetryPolicy::default().with_max_attempts(3));

    if let Err(e) = run(config).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = RdapClient::with_config(config)?;
    let response = client.domain("example.com").await?;

    let domain = response
        .as_domain()
        .ok_or("registry did not return a domain object")?;

    println!("Domain: {}", domain.name);
    println!("Status: {}", domain.status.join(", "));
    println!("Nameservers: {}", domain.nameservers.join(", "));
    println!(
        "Registered: {}",
        domain.registration_date.as_deref().unwrap_or("unknown")
    );
    println!(
        "Expires: {}",
        domain.expiration_date.as_deref().unwrap_or("unknown")
    );
    println!(
        "Registrar: {}",
        domain
            .registrar
            .as_ref()
            .and_then(|r| r.name.as_deref())
            .unwrap_or("unknown")
    );
    println!();
    println!("Query completed successfully!");

    Ok(())
}
