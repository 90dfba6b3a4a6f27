// src/core/search.rs

use futures::{StreamExt, stream};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::dorks::DorkQuery;
use crate::core::models::SearchHit;

/// Upper bound on the wait for one search round-trip.
const SEARCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
/// Dork queries are independent read-only calls, so a small fan-out is safe.
const MAX_CONCURRENT_QUERIES: usize = 4;
/// Pagination is not auto-followed; callers ask for further pages explicitly.
const FIRST_PAGE: u32 = 1;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("search backend returned HTTP {0}")]
    Http(StatusCode),
    #[error("malformed search response: {0}")]
    Malformed(String),
}

/// Wire shape of the search backend's response body. A backend answer with
/// no `items` array is a successful zero-hit result, not a failure.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchHit>,
}

/// Client for the external search service. One instance is shared across
/// the whole dork batch.
pub struct SearchGateway {
    client: reqwest::Client,
    api_key: String,
    engine_id: String,
    endpoint: String,
}

impl SearchGateway {
    pub fn new(settings: &Settings) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ArgusRecon/", env!("CARGO_PKG_VERSION")))
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| SearchError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            api_key: settings.search_api_key.clone(),
            engine_id: settings.search_engine_id.clone(),
            endpoint: settings.search_api_url.clone(),
        })
    }

    /// Executes one query, returning the backend's hits in relevance order.
    ///
    /// `start` is the 1-based offset cursor of the backend; `lang` is its
    /// language restriction parameter (e.g. "lang_es").
    pub async fn search(
        &self,
        query: &str,
        start: u32,
        lang: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        debug!(query, start, "Issuing search request.");
        let start_param = start.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("start", start_param.as_str()),
                ("lr", lang),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(query, status = %status, "Search backend returned an error status.");
            return Err(SearchError::Http(status));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::Malformed(e.to_string())
            }
        })?;

        if body.items.is_empty() {
            info!(query, "Search succeeded with zero matches.");
        } else {
            debug!(query, hits = body.items.len(), "Search returned hits.");
        }
        Ok(body.items)
    }
}

fn map_transport_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout
    } else {
        SearchError::Connection(e.to_string())
    }
}

/// Runs the whole dork batch against the gateway with bounded concurrency.
/// The returned outcomes are in query order; failures stay in place so the
/// aggregation step can log them per query.
pub async fn run_dork_searches(
    gateway: &SearchGateway,
    queries: &[DorkQuery],
    lang: &str,
) -> Vec<Result<Vec<SearchHit>, SearchError>> {
    stream::iter(queries)
        .map(|dork| async move {
            let outcome = gateway.search(&dork.query, FIRST_PAGE, lang).await;
            if let Err(e) = &outcome {
                warn!(category = dork.category, error = %e, "Dork query failed.");
            }
            outcome
        })
        .buffered(MAX_CONCURRENT_QUERIES)
        .collect()
        .await
}

/// Merges per-query outcomes into one ordered candidate list.
///
/// `Ok` payloads are concatenated in input order; `Err` entries contribute
/// nothing and never truncate or reorder their siblings. No deduplication
/// happens here.
pub fn aggregate(results: Vec<Result<Vec<SearchHit>, SearchError>>) -> Vec<SearchHit> {
    let mut candidates = Vec::new();
    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(hits) => candidates.extend(hits),
            Err(e) => {
                failed += 1;
                warn!(error = %e, "Discarding failed sub-query.");
            }
        }
    }
    info!(
        candidates = candidates.len(),
        failed_queries = failed,
        "Aggregated search results."
    );
    candidates
}
