use crate::embeddings::{clip_query, QueryEmbedder};
use crate::error::SearchError;
use crate::models::{Candidate, ChunkWindow, Source};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// Vector index over a Qdrant-compatible HTTP API. The query is embedded
/// once per call through the injected embedder.
#[derive(Clone)]
pub struct QdrantStore {
    client: Client,
    endpoint: String,
    collection: String,
    embedder: Arc<dyn QueryEmbedder + Send + Sync>,
    distance_scores: bool,
}

impl QdrantStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        embedder: Arc<dyn QueryEmbedder + Send + Sync>,
    ) -> Result<Self, SearchError> {
        Url::parse(endpoint)?;
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            collection: collection.into(),
            embedder,
            distance_scores: false,
        })
    }

    /// For collections scored by a distance metric, where lower raw scores
    /// mean closer matches.
    pub fn with_distance_scores(mut self) -> Self {
        self.distance_scores = true;
        self
    }
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn search(
        &self,
        document_id: &str,
        query_text: &str,
        top_k: usize,
        window: Option<ChunkWindow>,
    ) -> Result<Vec<Candidate>, SearchError> {
        let vector = self.embedder.embed(clip_query(query_text)).await?;

        let mut must = vec![json!({"key": "document_id", "match": {"value": document_id}})];
        if let Some(window) = window {
            let mut clause = serde_json::Map::new();
            if let Some(start) = window.start {
                clause.insert("gte".to_string(), json!(start));
            }
            if let Some(end) = window.end {
                clause.insert("lte".to_string(), json!(end));
            }
            if !clause.is_empty() {
                must.push(json!({"key": "chunk_id", "range": Value::Object(clause)}));
            }
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&json!({
                "vector": vector,
                "limit": top_k,
                "with_payload": ["chunk_id"],
                "filter": {"must": must}
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendUnavailable {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parse_point_hits(&parsed, self.distance_scores))
    }
}

fn parse_point_hits(response: &Value, distance_scores: bool) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = response
        .pointer("/result")
        .and_then(Value::as_array)
        .map(|hits| hits.iter())
        .into_iter()
        .flatten()
        .filter_map(|hit| {
            let chunk_id = hit.pointer("/payload/chunk_id")?.as_u64()?;
            let raw = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            let score = if distance_scores { 1.0 / (1.0 + raw) } else { raw };
            Some(Candidate::new(chunk_id, score, Source::Vector))
        })
        .collect();

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
    use crate::embeddings::CharacterNgramEmbedder;

    #[test]
    fn similarity_scores_pass_through() {
        let response = json!({
            "result": [
                {"id": 1, "score": 0.4, "payload": {"chunk_id": 11}},
                {"id": 2, "score": 0.9, "payload": {"chunk_id": 4}}
            ]
        });
        let candidates = parse_point_hits(&response, false);
        let ids: Vec<u64> = candidates.iter().map(|candidate| candidate.chunk_id).collect();
        assert_eq!(ids, vec![4, 11]);
        assert_eq!(candidates[0].score, 0.9);
    }

    #[test]
    fn distance_scores_invert_to_similarity() {
        let response = json!({
            "result": [
                {"id": 1, "score": 3.0, "payload": {"chunk_id": 11}},
                {"id": 2, "score": 0.0, "payload": {"chunk_id": 4}}
            ]
        });
        let candidates = parse_point_hits(&response, true);
        // distance 0 is the closest match
        assert_eq!(candidates[0].chunk_id, 4);
        assert_eq!(candidates[0].score, 1.0);
        assert_eq!(candidates[1].score, 0.25);
    }

    #[test]
    fn bad_endpoint_is_rejected_at_construction() {
        let embedder = Arc::new(CharacterNgramEmbedder::default());
        assert!(QdrantStore::new("::", "chunks", embedder).is_err());
    }
}
