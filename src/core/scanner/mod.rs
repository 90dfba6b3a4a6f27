// src/core/scanner/mod.rs

// Public interface of the network-enrichment module: three independent,
// read-only lookups against the target domain.
pub mod dns_scanner;
pub mod port_scanner;
pub mod whois_scanner;

use self::dns_scanner::{resolve_ns_ips, run_dns_scan};
use self::port_scanner::run_port_scans;
use self::whois_scanner::run_whois_scan;
use crate::core::models::{DnsRecordSet, PortFinding, WhoisRecord};

/// Everything the enrichment branch observed about a domain. Each field is
/// populated best-effort; a failed branch leaves its marker (empty answer
/// lists, an error-carrying WHOIS record, zero port findings) without
/// touching the others.
#[derive(Debug, Clone)]
pub struct EnrichmentResults {
    pub dns: DnsRecordSet,
    pub whois: WhoisRecord,
    pub ports: Vec<PortFinding>,
}

/// Runs all enrichment lookups for one domain.
///
/// WHOIS needs nothing from the other branches, so it runs concurrently
/// with the DNS resolution; the port scan chains behind DNS because its
/// target IPs come from the resolved A/NS records.
pub async fn run_enrichment(target: &str) -> EnrichmentResults {
    let ((dns, ports), whois) = tokio::join!(
        async {
            let dns = run_dns_scan(target).await;
            let ips = resolve_ns_ips(&dns).await;
            let ports = run_port_scans(&ips).await;
            (dns, ports)
        },
        run_whois_scan(target)
    );

    EnrichmentResults { dns, whois, ports }
}
