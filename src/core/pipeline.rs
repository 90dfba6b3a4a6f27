// src/core/pipeline.rs

use clap::ValueEnum;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Settings;
use crate::core::classify::{ClassifyError, RiskClassifier};
use crate::core::dorks::{generate_dorks, sanitize_domain};
use crate::core::models::{Finding, Report};
use crate::core::report::assemble;
use crate::core::scanner::{EnrichmentResults, run_enrichment};
use crate::core::search::{SearchGateway, aggregate, run_dork_searches};

/// Pipeline branches a caller can select. The two branches are independent
/// and composable; `Full` runs both concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    DorkTriage,
    NetworkEnrich,
    Full,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raised only when no stage that ran produced anything usable. Partial
    /// degradation (a failed branch here and there) still yields a report.
    #[error("no pipeline stage produced usable output for `{0}`")]
    NoUsableOutput(String),
}

/// What the dork-triage branch observed. The candidate count is kept apart
/// from the findings so a classification failure after a successful search
/// is not mistaken for a fully dry run.
struct TriageOutcome {
    candidates: usize,
    findings: Option<Vec<Finding>>,
}

/// The single entry point the routing layer invokes.
///
/// A report is produced whenever at least one stage yielded usable output;
/// per-branch failures degrade the corresponding report sections to absent
/// rather than aborting siblings.
pub async fn perform_reconnaissance(
    settings: &Settings,
    domain: &str,
    mode: Mode,
    lang: &str,
) -> Result<Report, PipelineError> {
    let target = sanitize_domain(domain);
    info!(domain = %target, mode = ?mode, "Reconnaissance started.");

    let (triage, enrichment): (Option<TriageOutcome>, Option<EnrichmentResults>) = match mode {
        Mode::DorkTriage => (Some(run_dork_triage(settings, &target, lang).await), None),
        Mode::NetworkEnrich => (None, Some(run_enrichment(&target).await)),
        Mode::Full => {
            let (triage, enrichment) = tokio::join!(
                run_dork_triage(settings, &target, lang),
                run_enrichment(&target)
            );
            (Some(triage), Some(enrichment))
        }
    };

    let candidates_seen = triage.as_ref().map_or(0, |t| t.candidates);
    let findings = triage.and_then(|t| t.findings);
    let (dns, whois, ports) = match enrichment {
        Some(results) => (Some(results.dns), Some(results.whois), Some(results.ports)),
        None => (None, None, None),
    };

    let report = assemble(&target, findings, dns, whois, ports);
    if !has_usable_output(&report, candidates_seen) {
        warn!(domain = %target, "Reconnaissance produced no usable output.");
        return Err(PipelineError::NoUsableOutput(target));
    }
    info!(domain = %target, "Reconnaissance finished.");
    Ok(report)
}

/// Dork generation, search fan-out, aggregation and classification.
/// Every failure inside this branch degrades to "no findings"; the branch
/// itself never fails the pipeline.
async fn run_dork_triage(settings: &Settings, domain: &str, lang: &str) -> TriageOutcome {
    let queries = generate_dorks(domain);

    let gateway = match SearchGateway::new(settings) {
        Ok(gateway) => gateway,
        Err(e) => {
            warn!(error = %e, "Could not build the search gateway; skipping triage.");
            return TriageOutcome {
                candidates: 0,
                findings: None,
            };
        }
    };
    let results = run_dork_searches(&gateway, &queries, lang).await;
    let candidates = aggregate(results);
    let candidate_count = candidates.len();

    let classifier = match RiskClassifier::new(settings) {
        Ok(classifier) => classifier,
        Err(e) => {
            warn!(error = %e, "Could not build the risk classifier; findings omitted.");
            return TriageOutcome {
                candidates: candidate_count,
                findings: None,
            };
        }
    };

    // The three failure causes resolve identically (no findings) but are
    // logged apart so observability can tell them apart.
    let findings = match classifier.classify(&candidates).await {
        Ok(findings) => Some(findings),
        Err(ClassifyError::EmptyInput) => {
            info!("No candidates collected; classification skipped.");
            None
        }
        Err(e @ ClassifyError::BackendUnavailable(_)) => {
            warn!(error = %e, "Classifier backend unavailable; findings omitted.");
            None
        }
        Err(e @ ClassifyError::InvalidSchema(_)) => {
            warn!(error = %e, "Schema violation in classifier response; findings omitted.");
            None
        }
    };

    TriageOutcome {
        candidates: candidate_count,
        findings,
    }
}

/// "Usable output" is any of: candidates collected by the search stage
/// (even if classification later failed), findings, at least one answered
/// DNS record type, a WHOIS record that is not error-only, or any port
/// finding.
fn has_usable_output(report: &Report, candidates_seen: usize) -> bool {
    if candidates_seen > 0 {
        return true;
    }
    if report.findings.as_ref().is_some_and(|f| !f.is_empty()) {
        return true;
    }
    if report
        .dns
        .as_ref()
        .is_some_and(|records| records.values().any(|values| !values.is_empty()))
    {
        return true;
    }
    if report.whois.as_ref().is_some_and(|w| w.error.is_none()) {
        return true;
    }
    report.ports.as_ref().is_some_and(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::WhoisRecord;
    use crate::core::scanner::dns_scanner::empty_record_set;

    #[test]
    fn candidates_alone_count_as_usable_output() {
        // A classifier failure after a successful search still yields a report.
        let report = assemble("example.com", None, None, None, None);
        assert!(has_usable_output(&report, 3));
        assert!(!has_usable_output(&report, 0));
    }

    #[test]
    fn answered_dns_types_count_as_usable_output() {
        let mut records = empty_record_set();
        records.insert("A".to_string(), vec!["93.184.216.34".to_string()]);
        let report = assemble("example.com", None, Some(records), None, None);
        assert!(has_usable_output(&report, 0));
    }

    #[test]
    fn all_empty_branches_are_a_total_failure() {
        let report = assemble(
            "example.com",
            None,
            Some(empty_record_set()),
            Some(WhoisRecord::from_error("lookup failed")),
            Some(Vec::new()),
        );
        assert!(!has_usable_output(&report, 0));
    }

    #[test]
    fn an_intact_whois_record_counts_as_usable_output() {
        let whois = WhoisRecord {
            registrar: Some("Example Registrar".to_string()),
            ..WhoisRecord::default()
        };
        let report = assemble("example.com", None, None, Some(whois), None);
        assert!(has_usable_output(&report, 0));
    }
}
