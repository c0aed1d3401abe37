pub mod assemble;
pub mod cache;
pub mod directory;
pub mod embeddings;
pub mod error;
pub mod expand;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod range;
pub mod retry;
pub mod store;
pub mod stores;
pub mod traits;
pub mod verify;

pub use cache::{BackendConfig, BackendConnectionCache, EmbeddingEndpoint, OracleEndpoint, SearchBackends};
pub use embeddings::{CharacterNgramEmbedder, QueryEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::SearchError;
pub use models::{
    classify_instruction, Candidate, Chunk, ChunkIdRange, ChunkWindow, Document, PageRange,
    Provenance, RangeBounds, SearchMode, SearchOutcome, SearchRequest, Source,
    DIRECTORY_INSTRUCTION,
};
pub use orchestrator::{OrchestratorConfig, SearchOrchestrator};
pub use retry::{Deadline, RetryPolicy};
pub use stores::{CatalogResolver, ChatOracle, OpenAiEmbedder, OpenSearchStore, QdrantStore};
pub use traits::{
    DocumentResolver, Judgment, JudgmentCriterion, JudgmentOracle, LexicalIndex, LexicalQuery,
    VectorIndex,
};
