use crate::embeddings::{clip_query, QueryEmbedder};
use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

/// Remote embedder against an OpenAI-compatible embeddings endpoint.
/// Every failure mode — transport, status, malformed payload — surfaces as
/// `EmbeddingUnavailable` so the caller can treat it as one backend fault.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Result<Self, SearchError> {
        Url::parse(endpoint)?;
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimensions,
        })
    }
}

#[async_trait]
impl QueryEmbedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .json(&json!({
                "input": clip_query(text),
                "model": self.model
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| SearchError::EmbeddingUnavailable(error.to_string()))?;
        if !response.status().is_success() {
            return Err(SearchError::EmbeddingUnavailable(
                response.status().to_string(),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| SearchError::EmbeddingUnavailable(error.to_string()))?;

        parse_embedding(&body).ok_or_else(|| {
            SearchError::EmbeddingUnavailable("response carries no embedding vector".to_string())
        })
    }
}

fn parse_embedding(body: &Value) -> Option<Vec<f32>> {
    let values = body.pointer("/data/0/embedding")?.as_array()?;
    values
        .iter()
        .map(|value| value.as_f64().map(|number| number as f32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_vector_is_extracted() {
        let body = json!({"data": [{"embedding": [0.25, -0.5, 1.0]}]});
        assert_eq!(parse_embedding(&body), Some(vec![0.25, -0.5, 1.0]));
    }

    #[test]
    fn missing_or_malformed_vectors_are_rejected() {
        assert_eq!(parse_embedding(&json!({"data": []})), None);
        assert_eq!(
            parse_embedding(&json!({"data": [{"embedding": [0.1, "oops"]}]})),
            None
        );
    }
}
