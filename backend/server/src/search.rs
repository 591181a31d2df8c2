//! # Web search
//!
//! Thin client for the Bing Search API (Azure Datamarket flavour).
//!
//!
//!
//! ## Request
//! - `GET {root}Web?$format=json&$top=10&$skip=0&Query='<terms>'`
//! - Terms are wrapped in single quotes, then percent-encoded
//! - HTTP basic auth, empty username, API key as the password
//! - Bounded by the configured timeout
//!
//!
//!
//! ## Response
//! ```json
//! { "d": { "results": [ { "Title": "..", "Url": "..", "Description": ".." } ] } }
//! ```
//!
//! Every failure (transport, status, body) is logged and turned into an
//! empty result list. Nothing is cached or retried.
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const SOURCE: &str = "Web";
pub const RESULTS_PER_PAGE: u32 = 10;
pub const OFFSET: u32 = 0;

const QUERY_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub summary: String,
}

#[derive(Deserialize)]
struct Envelope {
    d: Results,
}

#[derive(Deserialize)]
struct Results {
    results: Vec<Entry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Entry {
    title: String,
    url: String,
    description: String,
}

impl From<Entry> for SearchResult {
    fn from(entry: Entry) -> Self {
        Self {
            title: entry.title,
            link: entry.url,
            summary: entry.description,
        }
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct SearchClient {
    http: Client,
    root_url: String,
    api_key: Option<String>,
}

impl SearchClient {
    pub fn new(
        root_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            root_url: root_url.to_string(),
            api_key,
        })
    }

    pub fn query_url(&self, terms: &str) -> String {
        let quoted = format!("'{terms}'");
        let encoded = utf8_percent_encode(&quoted, QUERY_SET);

        format!(
            "{}{SOURCE}?$format=json&$top={RESULTS_PER_PAGE}&$skip={OFFSET}&Query={encoded}",
            self.root_url
        )
    }

    /// Never fails; problems are logged and yield no results.
    pub async fn search(&self, terms: &str) -> Vec<SearchResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("Search API key missing, skipping query");
            return Vec::new();
        };

        match self.fetch(terms, api_key).await {
            Ok(results) => {
                debug!("Search for {terms:?} returned {} results", results.len());
                results
            }
            Err(e) => {
                warn!("Error when querying the search API: {e}");
                Vec::new()
            }
        }
    }

    async fn fetch(&self, terms: &str, api_key: &str) -> Result<Vec<SearchResult>, SearchError> {
        let body = self
            .http
            .get(self.query_url(terms))
            .basic_auth("", Some(api_key))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_results(&body)?)
    }
}

pub fn parse_results(body: &str) -> Result<Vec<SearchResult>, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(body)?;

    Ok(envelope.d.results.into_iter().map(SearchResult::from).collect())
}
