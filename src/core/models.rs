// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

// --- Search Models ---

/// One candidate finding returned by the search backend for a single dork
/// query. Field defaults cover backends that omit `snippet` (or, rarely,
/// `title`) for some result kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub link: String,
}

// --- Triage Models ---

/// Risk level assigned to a candidate by the classifier.
///
/// `EnumString` is case-insensitive so the backend may answer "low", "Low"
/// or "LOW"; anything outside these three labels is a schema violation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The classifier's validated verdict for one candidate.
///
/// `index` is 1-based and always references a position that existed in the
/// candidate list sent for classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub index: usize,
    pub link: String,
    pub severity: Severity,
    pub explanation: String,
    pub mitigation: String,
}

// --- Enrichment Models ---

/// Record-type label to answer values. Every requested type is present as
/// a key; a failed or empty lookup maps to an empty list, never to a
/// missing key. The BTreeMap keeps the fixed A..TXT ordering on output.
pub type DnsRecordSet = BTreeMap<String, Vec<String>>;

/// Registration data extracted from WHOIS registry responses.
///
/// Every field is independently optional; a failed lookup populates only
/// `error`, so the serialized form degrades to `{"error": "..."}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhoisRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_servers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emails: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WhoisRecord {
    /// A record whose only populated field carries the failure message.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Service fingerprint reported by the port scanner. Empty strings mean
/// "no fingerprint", so the serialized service object is always present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// One open-port observation on a scanned host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortFinding {
    pub ip: String,
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: ServiceInfo,
}

// --- Report ---

/// The top-level persisted artifact. Optional sections stay absent when
/// the branch that produces them did not run or produced nothing; the
/// assembler never fills placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub domain: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findings: Option<Vec<Finding>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsRecordSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<PortFinding>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn severity_labels_parse_case_insensitively() {
        assert_eq!(Severity::from_str("low").unwrap(), Severity::Low);
        assert_eq!(Severity::from_str("MEDIUM").unwrap(), Severity::Medium);
        assert_eq!(Severity::from_str("High").unwrap(), Severity::High);
        assert!(Severity::from_str("Critical").is_err());
    }

    #[test]
    fn whois_error_record_serializes_to_error_only() {
        let record = WhoisRecord::from_error("connection refused");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"error": "connection refused"}));
    }

    #[test]
    fn empty_service_serializes_as_empty_object() {
        let finding = PortFinding {
            ip: "192.0.2.1".to_string(),
            port: 22,
            protocol: "tcp".to_string(),
            state: "open".to_string(),
            service: ServiceInfo::default(),
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["service"], serde_json::json!({}));
    }
}
