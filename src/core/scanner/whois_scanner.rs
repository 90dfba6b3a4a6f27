// src/core/scanner/whois_scanner.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::models::WhoisRecord;

const IANA_WHOIS_HOST: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;
/// Budget per server hop; a registry that does not answer in this window is
/// treated as a failed lookup.
const WHOIS_TIMEOUT: Duration = Duration::from_secs(10);

// Field patterns covering the common registry/registrar response dialects.
// Keys are matched per line, case-insensitively.
static RE_REFER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*refer:\s*(\S+)").unwrap());
static RE_DOMAIN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:Domain Name|domain):\s*(.+)$").unwrap());
static RE_REGISTRAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:Registrar|registrar):\s*(.+)$").unwrap());
static RE_WHOIS_SERVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:Registrar WHOIS Server|whois):\s*(\S+)").unwrap());
static RE_CREATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:Creation Date|Created On|Registered on|created):\s*(.+)$").unwrap()
});
static RE_EXPIRES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:Registry Expiry Date|Expiration Date|Expiry date|paid-till):\s*(.+)$")
        .unwrap()
});
static RE_UPDATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:Updated Date|Last updated|last-update|changed):\s*(.+)$").unwrap()
});
static RE_NAME_SERVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:Name Server|nserver|nameserver):\s*(\S+)").unwrap());
static RE_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:Domain Status|status):\s*(.+)$").unwrap());
static RE_COUNTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:Registrant Country|country):\s*(.+)$").unwrap());
static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

/// Looks up the registration data for a domain.
///
/// Any failure along the server chain yields a record whose only populated
/// field is the error message; partial data is never fabricated.
pub async fn run_whois_scan(domain: &str) -> WhoisRecord {
    info!(domain, "Starting WHOIS lookup.");
    match whois_lookup(domain).await {
        Ok(record) => {
            info!(domain, "WHOIS lookup finished.");
            record
        }
        Err(e) => {
            warn!(domain, error = %e, "WHOIS lookup failed.");
            WhoisRecord::from_error(e)
        }
    }
}

/// RFC 3912 query chain: IANA names the authoritative registry, the
/// registry may name the registrar's own server. The registrar's answer is
/// richer when present, so its fields take precedence over the registry's.
async fn whois_lookup(domain: &str) -> Result<WhoisRecord, String> {
    debug!(domain, "Querying IANA for the authoritative registry.");
    let iana_response = query_server(IANA_WHOIS_HOST, domain).await?;
    let registry_server = first_capture(&RE_REFER, &iana_response)
        .ok_or_else(|| format!("IANA response carries no registry referral for {domain}"))?;

    debug!(server = %registry_server, "Querying the registry server.");
    let registry_response = query_server(&registry_server, domain).await?;
    let mut record = parse_whois_response(&registry_response);

    if let Some(registrar_server) = record.whois_server.clone() {
        if !registrar_server.eq_ignore_ascii_case(&registry_server) {
            debug!(server = %registrar_server, "Following the registrar referral.");
            match query_server(&registrar_server, domain).await {
                Ok(response) => {
                    record = merge_records(parse_whois_response(&response), record);
                }
                Err(e) => {
                    warn!(server = %registrar_server, error = %e, "Registrar hop failed; keeping registry data.");
                }
            }
        }
    }
    Ok(record)
}

/// One WHOIS round-trip: send the query, read until the server closes.
async fn query_server(server: &str, query: &str) -> Result<String, String> {
    let address = format!("{server}:{WHOIS_PORT}");
    let exchange = async {
        let mut stream = TcpStream::connect(&address)
            .await
            .map_err(|e| format!("connect to {server} failed: {e}"))?;
        stream
            .write_all(format!("{query}\r\n").as_bytes())
            .await
            .map_err(|e| format!("write to {server} failed: {e}"))?;
        let mut raw = Vec::new();
        stream
            .read_to_end(&mut raw)
            .await
            .map_err(|e| format!("read from {server} failed: {e}"))?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    };
    timeout(WHOIS_TIMEOUT, exchange)
        .await
        .map_err(|_| format!("WHOIS query to {server} timed out"))?
}

/// Extracts the known registration fields from a raw WHOIS response.
/// Fields that do not appear stay `None`; one missing field never
/// invalidates the others.
pub fn parse_whois_response(text: &str) -> WhoisRecord {
    WhoisRecord {
        registrar: first_capture(&RE_REGISTRAR, text),
        creation_date: first_capture(&RE_CREATED, text),
        expiration_date: first_capture(&RE_EXPIRES, text),
        updated_date: first_capture(&RE_UPDATED, text),
        name_servers: all_captures(&RE_NAME_SERVER, text),
        status: all_captures(&RE_STATUS, text),
        emails: unique_emails(text),
        country: first_capture(&RE_COUNTRY, text),
        whois_server: first_capture(&RE_WHOIS_SERVER, text),
        domain_name: first_capture(&RE_DOMAIN_NAME, text),
        error: None,
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn all_captures(re: &Regex, text: &str) -> Option<Vec<String>> {
    let values: Vec<String> = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if values.is_empty() { None } else { Some(values) }
}

fn unique_emails(text: &str) -> Option<Vec<String>> {
    let mut seen = std::collections::BTreeSet::new();
    for m in RE_EMAIL.find_iter(text) {
        seen.insert(m.as_str().to_ascii_lowercase());
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.into_iter().collect())
    }
}

/// Field-wise merge; `primary` wins wherever it is populated.
fn merge_records(primary: WhoisRecord, fallback: WhoisRecord) -> WhoisRecord {
    WhoisRecord {
        registrar: primary.registrar.or(fallback.registrar),
        creation_date: primary.creation_date.or(fallback.creation_date),
        expiration_date: primary.expiration_date.or(fallback.expiration_date),
        updated_date: primary.updated_date.or(fallback.updated_date),
        name_servers: primary.name_servers.or(fallback.name_servers),
        status: primary.status.or(fallback.status),
        emails: primary.emails.or(fallback.emails),
        country: primary.country.or(fallback.country),
        whois_server: primary.whois_server.or(fallback.whois_server),
        domain_name: primary.domain_name.or(fallback.domain_name),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY_RESPONSE: &str = "\
Domain Name: EXAMPLE.COM\r
Registry Domain ID: 2336799_DOMAIN_COM-VRSN\r
Registrar WHOIS Server: whois.iana.org\r
Registrar: RESERVED-Internet Assigned Numbers Authority\r
Updated Date: 2024-08-14T07:01:34Z\r
Creation Date: 1995-08-14T04:00:00Z\r
Registry Expiry Date: 2025-08-13T04:00:00Z\r
Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited\r
Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited\r
Registrant Country: US\r
Registrar Abuse Contact Email: abuse@iana.org\r
Name Server: A.IANA-SERVERS.NET\r
Name Server: B.IANA-SERVERS.NET\r
";

    #[test]
    fn parses_the_standard_registry_fields() {
        let record = parse_whois_response(REGISTRY_RESPONSE);
        assert_eq!(record.domain_name.as_deref(), Some("EXAMPLE.COM"));
        assert_eq!(
            record.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(record.creation_date.as_deref(), Some("1995-08-14T04:00:00Z"));
        assert_eq!(
            record.expiration_date.as_deref(),
            Some("2025-08-13T04:00:00Z")
        );
        assert_eq!(record.whois_server.as_deref(), Some("whois.iana.org"));
        assert_eq!(record.country.as_deref(), Some("US"));
        assert_eq!(
            record.name_servers.as_deref(),
            Some(&["A.IANA-SERVERS.NET".to_string(), "B.IANA-SERVERS.NET".to_string()][..])
        );
        assert_eq!(record.status.as_ref().map(Vec::len), Some(2));
        assert_eq!(
            record.emails.as_deref(),
            Some(&["abuse@iana.org".to_string()][..])
        );
        assert!(record.error.is_none());
    }

    #[test]
    fn missing_fields_stay_none_without_invalidating_the_rest() {
        let record = parse_whois_response("Domain Name: example.org\nstatus: ACTIVE\n");
        assert_eq!(record.domain_name.as_deref(), Some("example.org"));
        assert_eq!(record.status.as_deref(), Some(&["ACTIVE".to_string()][..]));
        assert!(record.registrar.is_none());
        assert!(record.creation_date.is_none());
        assert!(record.name_servers.is_none());
        assert!(record.emails.is_none());
    }

    #[test]
    fn iana_referral_is_extracted() {
        let response = "domain:       COM\nrefer:        whois.verisign-grs.com\nstatus: ACTIVE\n";
        assert_eq!(
            first_capture(&RE_REFER, response).as_deref(),
            Some("whois.verisign-grs.com")
        );
    }

    #[test]
    fn emails_are_deduplicated_and_lowercased() {
        let text = "Email: Abuse@Example.com\nContact: abuse@example.com\n";
        let record = parse_whois_response(text);
        assert_eq!(
            record.emails.as_deref(),
            Some(&["abuse@example.com".to_string()][..])
        );
    }

    #[test]
    fn merge_prefers_the_registrar_answer() {
        let registry = parse_whois_response("Registrar: Registry View\nCreation Date: 1999-01-01\n");
        let registrar = parse_whois_response("Registrar: Registrar View\n");
        let merged = merge_records(registrar, registry);
        assert_eq!(merged.registrar.as_deref(), Some("Registrar View"));
        assert_eq!(merged.creation_date.as_deref(), Some("1999-01-01"));
    }
}
