// src/core/mod.rs

// Root of the `core` module: the reconnaissance-and-triage pipeline and
// everything it is made of.

/// Data models shared across the pipeline: search hits, findings, the
/// enrichment records and the final `Report`.
pub mod models;

/// Dork query generation from the static rule table.
pub mod dorks;

/// Search gateway and result aggregation.
pub mod search;

/// Risk classification through the generative backend, including payload
/// extraction and schema validation.
pub mod classify;

/// Network enrichment: DNS record resolution, WHOIS lookup and the
/// port/service scan.
pub mod scanner;

/// Report assembly and persistence.
pub mod report;

/// Branch orchestration and the `perform_reconnaissance` entry point.
pub mod pipeline;
