pub mod embedding;
pub mod opensearch;
pub mod oracle;
pub mod qdrant;
pub mod resolver;

pub use embedding::OpenAiEmbedder;
pub use opensearch::OpenSearchStore;
pub use oracle::ChatOracle;
pub use qdrant::QdrantStore;
pub use resolver::CatalogResolver;
