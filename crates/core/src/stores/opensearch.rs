use crate::error::SearchError;
use crate::models::{Candidate, Chunk, Source};
use crate::traits::{LexicalIndex, LexicalQuery};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

/// Upper bound on chunks fetched per document; documents beyond this are
/// outside the ingestion contract.
const FETCH_WINDOW: usize = 10_000;

/// Lexical index over an OpenSearch/Elasticsearch-compatible HTTP API.
#[derive(Clone)]
pub struct OpenSearchStore {
    client: Client,
    endpoint: String,
    index_name: String,
}

impl OpenSearchStore {
    pub fn new(endpoint: &str, index_name: impl Into<String>) -> Result<Self, SearchError> {
        Url::parse(endpoint)?;
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_name: index_name.into(),
        })
    }

    async fn run_query(&self, body: &Value) -> Result<Value, SearchError> {
        let response = self
            .client
            .post(format!("{}/{}/_search", self.endpoint, self.index_name))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendUnavailable {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LexicalIndex for OpenSearchStore {
    async fn fetch_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, SearchError> {
        let body = json!({
            "size": FETCH_WINDOW,
            "sort": [{"chunk_id": {"order": "asc"}}],
            "_source": ["chunk_id", "page_start", "page_end", "text"],
            "query": {
                "bool": {
                    "filter": [
                        {"term": {"document_id": document_id}}
                    ]
                }
            }
        });

        let response = self.run_query(&body).await?;
        Ok(parse_chunk_hits(&response))
    }

    async fn search(
        &self,
        document_id: &str,
        query: &LexicalQuery,
    ) -> Result<Vec<Candidate>, SearchError> {
        let base_query = if query.phrase {
            json!({"match_phrase": {"text": query.text}})
        } else {
            json!({
                "multi_match": {
                    "query": query.text,
                    "fields": ["text"],
                    "type": "best_fields",
                    "fuzziness": "AUTO"
                }
            })
        };

        let mut filters = vec![json!({"term": {"document_id": document_id}})];
        if let Some(window) = query.window {
            let mut clause = serde_json::Map::new();
            if let Some(start) = window.start {
                clause.insert("gte".to_string(), json!(start));
            }
            if let Some(end) = window.end {
                clause.insert("lte".to_string(), json!(end));
            }
            if !clause.is_empty() {
                filters.push(json!({"range": {"chunk_id": Value::Object(clause)}}));
            }
        }

        let body = json!({
            "size": query.top_k,
            "_source": ["chunk_id"],
            "query": {
                "bool": {
                    "must": [base_query],
                    "filter": filters
                }
            },
            "sort": [
                {"_score": {"order": "desc"}},
                {"chunk_id": {"order": "asc"}}
            ]
        });

        let response = self.run_query(&body).await?;
        Ok(parse_search_hits(&response))
    }
}

fn hits(response: &Value) -> Vec<&Value> {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|array| array.iter().collect())
        .unwrap_or_default()
}

fn parse_chunk_hits(response: &Value) -> Vec<Chunk> {
    hits(response)
        .into_iter()
        .filter_map(|hit| {
            let source = hit.pointer("/_source")?;
            Some(Chunk {
                chunk_id: source.pointer("/chunk_id")?.as_u64()?,
                page_start: source.pointer("/page_start")?.as_u64()? as u32,
                page_end: source.pointer("/page_end")?.as_u64()? as u32,
                text: source.pointer("/text")?.as_str()?.to_string(),
            })
        })
        .collect()
}

fn parse_search_hits(response: &Value) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = hits(response)
        .into_iter()
        .filter_map(|hit| {
            let chunk_id = hit.pointer("/_source/chunk_id")?.as_u64()?;
            let score = hit.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0);
            Some(Candidate::new(chunk_id, score, Source::Lexical))
        })
        .collect();

    // deterministic order regardless of backend tie handling
    candidates.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.chunk_id.cmp(&right.chunk_id))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hits_parse_page_metadata() {
        let response = json!({
            "hits": {"hits": [
                {"_id": "0", "_source": {"chunk_id": 0, "page_start": 1, "page_end": 1, "text": "封面"}},
                {"_id": "1", "_source": {"chunk_id": 1, "page_start": 1, "page_end": 2, "text": "目录"}}
            ]}
        });
        let chunks = parse_chunk_hits(&response);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chunk_id, 1);
        assert_eq!(chunks[1].page_end, 2);
    }

    #[test]
    fn search_hits_re_sort_for_determinism() {
        let response = json!({
            "hits": {"hits": [
                {"_score": 2.0, "_source": {"chunk_id": 9}},
                {"_score": 2.0, "_source": {"chunk_id": 4}},
                {"_score": 5.0, "_source": {"chunk_id": 7}}
            ]}
        });
        let candidates = parse_search_hits(&response);
        let ids: Vec<u64> = candidates.iter().map(|candidate| candidate.chunk_id).collect();
        assert_eq!(ids, vec![7, 4, 9]);
    }

    #[test]
    fn malformed_hits_are_skipped() {
        let response = json!({
            "hits": {"hits": [
                {"_score": 1.0, "_source": {"chunk_id": "not-a-number"}},
                {"_score": 1.0, "_source": {"chunk_id": 3}}
            ]}
        });
        let candidates = parse_search_hits(&response);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].chunk_id, 3);
    }

    #[test]
    fn bad_endpoint_is_rejected_at_construction() {
        assert!(OpenSearchStore::new("not a url", "chunks").is_err());
    }
}
