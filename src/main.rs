// src/main.rs

use clap::Parser;
use color_eyre::eyre::Result;
use url::Url;

mod config;
mod core;
mod logging;

use crate::config::Settings;
use crate::core::pipeline::{Mode, perform_reconnaissance};
use crate::core::report::persist_report;

#[derive(Debug, Parser)]
#[command(
    name = "argus-rs-recon",
    version,
    about = "Dork-driven reconnaissance and AI triage for a target domain"
)]
struct Cli {
    /// Target domain; a full URL is reduced to its host.
    domain: String,

    /// Pipeline branches to run.
    #[arg(long, value_enum, default_value = "full")]
    mode: Mode,

    /// Language restriction passed to the search backend.
    #[arg(long, default_value = "lang_es")]
    lang: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    logging::initialize_logging()?;

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let target = normalize_target(&cli.domain);

    let report = perform_reconnaissance(&settings, &target, cli.mode, &cli.lang).await?;
    let path = persist_report(&report)?;

    println!("Report for {} written to {}", report.domain, path.display());
    if let Some(findings) = &report.findings {
        println!("  findings: {}", findings.len());
    }
    if let Some(dns) = &report.dns {
        let answered = dns.values().filter(|values| !values.is_empty()).count();
        println!("  dns record types answered: {answered}");
    }
    if let Some(whois) = &report.whois {
        match &whois.error {
            Some(e) => println!("  whois: failed ({e})"),
            None => println!("  whois: ok"),
        }
    }
    if let Some(ports) = &report.ports {
        println!("  open ports: {}", ports.len());
    }
    Ok(())
}

/// Accepts either a bare domain or a pasted URL and reduces it to the host.
fn normalize_target(raw: &str) -> String {
    let with_scheme = if !raw.starts_with("http://") && !raw.starts_with("https://") {
        format!("https://{raw}")
    } else {
        raw.to_string()
    };
    Url::parse(&with_scheme)
        .ok()
        .and_then(|url| url.host_str().map(String::from))
        .unwrap_or_else(|| raw.to_string())
}
