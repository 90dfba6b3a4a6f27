// src/core/report.rs

use chrono::Utc;
use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::models::{DnsRecordSet, Finding, PortFinding, Report, WhoisRecord};
use crate::logging::get_reports_dir;

/// Merges the branch outputs into the final report and stamps it.
///
/// Pure: absent inputs stay absent, nothing is fabricated for branches
/// that did not run.
pub fn assemble(
    domain: &str,
    findings: Option<Vec<Finding>>,
    dns: Option<DnsRecordSet>,
    whois: Option<WhoisRecord>,
    ports: Option<Vec<PortFinding>>,
) -> Report {
    Report {
        domain: domain.to_string(),
        generated_at: Utc::now(),
        findings,
        dns,
        whois,
        ports,
    }
}

/// Writes the report as pretty JSON keyed by domain, overwriting any
/// previous run's artifact.
pub fn persist_report(report: &Report) -> Result<PathBuf> {
    write_report(report, &get_reports_dir())
}

fn write_report(report: &Report, directory: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(directory)?;
    let path = directory.join(format!("{}.json", report.domain));
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    info!(path = %path.display(), "Report persisted.");
    Ok(path)
}
