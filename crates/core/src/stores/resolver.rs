use crate::error::SearchError;
use crate::traits::DocumentResolver;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

/// Resolves a fund code and offering kind to a stored document id through
/// the documents catalog index.
///
/// A fund can carry several prospectus documents: the initial offering, a
/// later expanded offering, and advisory notices about either. Advisory
/// notices are excluded and the earliest publication of the requested kind
/// wins, so repeated calls resolve the same document.
#[derive(Clone)]
pub struct CatalogResolver {
    client: Client,
    endpoint: String,
    index_name: String,
}

impl CatalogResolver {
    pub fn new(endpoint: &str, index_name: impl Into<String>) -> Result<Self, SearchError> {
        Url::parse(endpoint)?;
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_name: index_name.into(),
        })
    }
}

#[async_trait]
impl DocumentResolver for CatalogResolver {
    async fn resolve(&self, fund_code: &str, is_expansion: bool) -> Result<String, SearchError> {
        let body = json!({
            "size": 50,
            "_source": ["document_id", "published_at"],
            "query": {
                "bool": {
                    "filter": [
                        {"term": {"fund_code": fund_code}},
                        {"term": {"is_expansion": is_expansion}}
                    ],
                    "must_not": [
                        {"term": {"advisory": true}}
                    ]
                }
            }
        });

        let response = self
            .client
            .post(format!("{}/{}/_search", self.endpoint, self.index_name))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendUnavailable {
                backend: "catalog".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let entries = parse_catalog_entries(&parsed);
        debug!(fund_code, is_expansion, count = entries.len(), "catalog entries found");

        earliest(&entries).ok_or_else(|| {
            let offering = if is_expansion {
                "expanded-offering"
            } else {
                "initial-offering"
            };
            SearchError::DocumentNotFound(format!("fund {fund_code} has no {offering} prospectus"))
        })
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    document_id: String,
    published_at: DateTime<Utc>,
}

fn parse_catalog_entries(response: &Value) -> Vec<CatalogEntry> {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| hits.iter())
        .into_iter()
        .flatten()
        .filter_map(|hit| {
            let source = hit.pointer("/_source")?;
            Some(CatalogEntry {
                document_id: source.pointer("/document_id")?.as_str()?.to_string(),
                published_at: source
                    .pointer("/published_at")?
                    .as_str()?
                    .parse::<DateTime<Utc>>()
                    .ok()?,
            })
        })
        .collect()
}

/// Sorting happens client-side so a catalog index without a date mapping
/// still resolves deterministically.
fn earliest(entries: &[CatalogEntry]) -> Option<String> {
    entries
        .iter()
        .min_by_key(|entry| (entry.published_at, entry.document_id.clone()))
        .map(|entry| entry.document_id.clone())
}
