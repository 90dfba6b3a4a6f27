// src/core/scanner/port_scanner.rs

use futures::{StreamExt, stream};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::models::{PortFinding, ServiceInfo};

/// Service detection (`-A`) is slow; give each host a generous budget.
const SCAN_TIMEOUT: Duration = Duration::from_secs(300);
/// Scans hammer the targets harder than DNS or WHOIS queries do, so the
/// fan-out across distinct IPs stays small. One IP is never scanned twice
/// within a run (the target list is already a set).
const MAX_CONCURRENT_SCANS: usize = 2;

/// Scans every target IP and flattens the per-host findings, in target
/// order. A failed scan contributes nothing and never aborts its siblings.
pub async fn run_port_scans(ips: &[String]) -> Vec<PortFinding> {
    info!(targets = ips.len(), "Starting port/service scans.");
    let per_host: Vec<Vec<PortFinding>> = stream::iter(ips)
        .map(|ip| async move {
            match run_port_scan(ip).await {
                Ok(findings) => findings,
                Err(e) => {
                    warn!(ip = %ip, error = %e, "Port scan failed.");
                    Vec::new()
                }
            }
        })
        .buffered(MAX_CONCURRENT_SCANS)
        .collect()
        .await;
    let findings: Vec<PortFinding> = per_host.into_iter().flatten().collect();
    info!(open_ports = findings.len(), "Port/service scans finished.");
    findings
}

/// Scans one IP by delegating to the external scanner process and parsing
/// its XML artifact. The scratch artifact is removed on success and failure
/// alike.
pub async fn run_port_scan(ip: &str) -> Result<Vec<PortFinding>, String> {
    let artifact = std::env::temp_dir().join(format!("nmap_{ip}.xml"));
    let outcome = scan_into(ip, &artifact).await;
    if let Err(e) = tokio::fs::remove_file(&artifact).await {
        debug!(artifact = %artifact.display(), error = %e, "Scratch artifact already gone.");
    }
    outcome
}

async fn scan_into(ip: &str, artifact: &Path) -> Result<Vec<PortFinding>, String> {
    debug!(ip, artifact = %artifact.display(), "Invoking scanner process.");
    let output = timeout(
        SCAN_TIMEOUT,
        Command::new("nmap")
            .args(["-A", "-Pn", "-T4", "-oX"])
            .arg(artifact)
            .arg(ip)
            .output(),
    )
    .await
    .map_err(|_| format!("scan of {ip} timed out"))?
    .map_err(|e| format!("failed to launch scanner process: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "scanner process exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    let xml = tokio::fs::read_to_string(artifact)
        .await
        .map_err(|e| format!("failed to read scan artifact: {e}"))?;
    parse_scan_xml(&xml)
}

/// Interprets the scanner's XML artifact.
///
/// Defensive against sparse documents: a host without an `address` yields
/// findings with an empty ip, an absent `ports` element yields no findings
/// for that host, and a `port` without a `service` child yields an empty
/// service object rather than an omitted one.
pub fn parse_scan_xml(xml: &str) -> Result<Vec<PortFinding>, String> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| format!("malformed scan XML: {e}"))?;

    let mut findings = Vec::new();
    for host in doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("host"))
    {
        let ip = host
            .children()
            .find(|n| n.has_tag_name("address"))
            .and_then(|n| n.attribute("addr"))
            .unwrap_or_default()
            .to_string();

        let Some(ports) = host.children().find(|n| n.has_tag_name("ports")) else {
            continue;
        };

        for port in ports.children().filter(|n| n.has_tag_name("port")) {
            let Some(number) = port.attribute("portid").and_then(|p| p.parse::<u16>().ok()) else {
                warn!(ip = %ip, "Port element without a usable portid; skipping.");
                continue;
            };
            let protocol = port.attribute("protocol").unwrap_or_default().to_string();
            let state = port
                .children()
                .find(|n| n.has_tag_name("state"))
                .and_then(|n| n.attribute("state"))
                .unwrap_or_default()
                .to_string();
            let service = port
                .children()
                .find(|n| n.has_tag_name("service"))
                .map(|n| ServiceInfo {
                    name: n.attribute("name").unwrap_or_default().to_string(),
                    product: n.attribute("product").unwrap_or_default().to_string(),
                    version: n.attribute("version").unwrap_or_default().to_string(),
                })
                .unwrap_or_default();

            findings.push(PortFinding {
                ip: ip.clone(),
                port: number,
                protocol,
                state,
                service,
            });
        }
    }
    Ok(findings)
}
