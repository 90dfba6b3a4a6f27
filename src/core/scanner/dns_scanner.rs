// src/core/scanner/dns_scanner.rs

use futures::future::join_all;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::core::models::DnsRecordSet;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RecordType;

/// The fixed, closed set of record types reported on. Every label below is
/// always a key of the resulting record set.
pub const RECORD_TYPES: &[(&str, RecordType)] = &[
    ("A", RecordType::A),
    ("AAAA", RecordType::AAAA),
    ("CNAME", RecordType::CNAME),
    ("MX", RecordType::MX),
    ("NS", RecordType::NS),
    ("SOA", RecordType::SOA),
    ("TXT", RecordType::TXT),
];

/// Resolves the target for every record type in `RECORD_TYPES`.
///
/// All lookups run concurrently. A per-type failure degrades to an empty
/// answer list for that type and never aborts the remaining lookups.
pub async fn run_dns_scan(target: &str) -> DnsRecordSet {
    info!(target, "Starting DNS record resolution.");
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let lookups = RECORD_TYPES
        .iter()
        .map(|(label, record_type)| lookup_records(&resolver, target, label, *record_type));
    let answers = join_all(lookups).await;

    let mut records = empty_record_set();
    let mut answered = 0usize;
    for (label, values) in answers {
        if !values.is_empty() {
            answered += 1;
        }
        records.insert(label.to_string(), values);
    }
    info!(target, answered_types = answered, "DNS resolution finished.");
    records
}

/// A record set with every requested type present and empty.
pub fn empty_record_set() -> DnsRecordSet {
    RECORD_TYPES
        .iter()
        .map(|(label, _)| (label.to_string(), Vec::new()))
        .collect()
}

async fn lookup_records(
    resolver: &TokioAsyncResolver,
    target: &str,
    label: &'static str,
    record_type: RecordType,
) -> (&'static str, Vec<String>) {
    match resolver.lookup(target, record_type).await {
        Ok(lookup) => {
            let values: Vec<String> = lookup.iter().map(|record| record.to_string()).collect();
            debug!(target, record_type = label, count = values.len(), "Lookup answered.");
            (label, values)
        }
        Err(e) => {
            warn!(target, record_type = label, error = %e, "Lookup failed; reporting empty answer.");
            (label, Vec::new())
        }
    }
}

/// Resolves the A records of every NS host discovered in `records` and
/// unions them, as a set, with the already-known A records. NS hosts whose
/// resolution fails are skipped. The result is the scan-target IP list for
/// the port scanner.
pub async fn resolve_ns_ips(records: &DnsRecordSet) -> Vec<String> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let mut ips: BTreeSet<String> = records
        .get("A")
        .map(|values| values.iter().cloned().collect())
        .unwrap_or_default();

    let ns_hosts: Vec<String> = records
        .get("NS")
        .map(|values| {
            values
                .iter()
                .map(|ns| ns.trim_end_matches('.').to_string())
                .collect()
        })
        .unwrap_or_default();

    let lookups = ns_hosts.iter().map(|host| {
        let resolver = &resolver;
        async move {
            match resolver.ipv4_lookup(host.as_str()).await {
                Ok(lookup) => lookup.iter().map(|a| a.to_string()).collect(),
                Err(e) => {
                    warn!(ns_host = %host, error = %e, "NS host resolution failed; skipping.");
                    Vec::new()
                }
            }
        }
    });
    for resolved in join_all(lookups).await {
        ips.extend(resolved);
    }

    debug!(count = ips.len(), "Collected scan-target IPs.");
    ips.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_set_carries_every_requested_type() {
        let records = empty_record_set();
        for (label, _) in RECORD_TYPES {
            let values = records
                .get(*label)
                .unwrap_or_else(|| panic!("missing key {label}"));
            assert!(values.is_empty());
        }
        assert_eq!(records.len(), RECORD_TYPES.len());
    }

    #[test]
    fn record_set_keys_keep_the_fixed_order() {
        let records = empty_record_set();
        let keys: Vec<&str> = records.keys().map(String::as_str).collect();
        assert_eq!(keys, ["A", "AAAA", "CNAME", "MX", "NS", "SOA", "TXT"]);
    }
}
