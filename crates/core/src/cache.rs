use crate::embeddings::{CharacterNgramEmbedder, QueryEmbedder};
use crate::error::SearchError;
use crate::stores::{CatalogResolver, ChatOracle, OpenAiEmbedder, OpenSearchStore, QdrantStore};
use std::sync::{Arc, Mutex};

/// Connection settings for every remote backend the engine talks to.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub opensearch_url: String,
    pub opensearch_index: String,
    pub catalog_index: String,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub qdrant_distance_scores: bool,
    pub embedding: Option<EmbeddingEndpoint>,
    pub oracle: OracleEndpoint,
}

#[derive(Debug, Clone)]
pub struct EmbeddingEndpoint {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
}

#[derive(Debug, Clone)]
pub struct OracleEndpoint {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// The process-wide bundle of connected backends.
pub struct SearchBackends {
    pub lexical: OpenSearchStore,
    pub vector: QdrantStore,
    pub oracle: ChatOracle,
    pub resolver: CatalogResolver,
}

impl SearchBackends {
    pub fn connect(config: &BackendConfig) -> Result<Self, SearchError> {
        let lexical = OpenSearchStore::new(&config.opensearch_url, &config.opensearch_index)?;
        let resolver = CatalogResolver::new(&config.opensearch_url, &config.catalog_index)?;

        let embedder: Arc<dyn QueryEmbedder + Send + Sync> = match &config.embedding {
            Some(endpoint) => Arc::new(OpenAiEmbedder::new(
                &endpoint.url,
                &endpoint.model,
                endpoint.api_key.clone(),
                endpoint.dimensions,
            )?),
            None => Arc::new(CharacterNgramEmbedder::default()),
        };

        let mut vector = QdrantStore::new(&config.qdrant_url, &config.qdrant_collection, embedder)?;
        if config.qdrant_distance_scores {
            vector = vector.with_distance_scores();
        }

        let oracle = ChatOracle::new(
            &config.oracle.url,
            &config.oracle.model,
            config.oracle.api_key.clone(),
        )?;

        Ok(Self {
            lexical,
            vector,
            oracle,
            resolver,
        })
    }
}

static BACKENDS: Mutex<Option<Arc<SearchBackends>>> = Mutex::new(None);

/// Process-wide, lazily initialized backend handle.
///
/// Initialization is idempotent and safe to race: the first caller connects,
/// later callers observe the cached bundle even if they pass a different
/// config. No per-request data lives here.
pub struct BackendConnectionCache;

impl BackendConnectionCache {
    pub fn get_or_init(config: &BackendConfig) -> Result<Arc<SearchBackends>, SearchError> {
        let mut slot = lock_slot();
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let backends = Arc::new(SearchBackends::connect(config)?);
        *slot = Some(Arc::clone(&backends));
        Ok(backends)
    }

    pub fn is_initialized() -> bool {
        lock_slot().is_some()
    }

    /// Drops the cached bundle. In-flight holders keep their `Arc`; the next
    /// `get_or_init` reconnects.
    pub fn teardown() {
        lock_slot().take();
    }
}

fn lock_slot() -> std::sync::MutexGuard<'static, Option<Arc<SearchBackends>>> {
    match BACKENDS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig {
            opensearch_url: "http://localhost:9200".to_string(),
            opensearch_index: "prospectus_chunks".to_string(),
            catalog_index: "prospectus_catalog".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_collection: "prospectus_chunks".to_string(),
            qdrant_distance_scores: false,
            embedding: None,
            oracle: OracleEndpoint {
                url: "http://localhost:8000/v1".to_string(),
                model: "judge".to_string(),
                api_key: None,
            },
        }
    }

    // One test body so the global slot is exercised without ordering races
    // between parallel test threads.
    #[test]
    fn init_is_idempotent_and_teardown_clears() {
        BackendConnectionCache::teardown();
        assert!(!BackendConnectionCache::is_initialized());

        let first = BackendConnectionCache::get_or_init(&config()).unwrap();
        assert!(BackendConnectionCache::is_initialized());

        let second = BackendConnectionCache::get_or_init(&config()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        BackendConnectionCache::teardown();
        assert!(!BackendConnectionCache::is_initialized());
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let mut bad = config();
        bad.opensearch_url = "not a url".to_string();
        assert!(matches!(
            SearchBackends::connect(&bad),
            Err(SearchError::Url(_))
        ));
    }
}
