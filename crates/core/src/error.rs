use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("{backend} unavailable: {details}")]
    BackendUnavailable { backend: String, details: String },

    #[error("{backend} call exceeded the request deadline")]
    BackendTimeout { backend: String },

    #[error("no plausible contents section in document {0}")]
    DirectoryNotFound(String),

    #[error("boundary verification undecided for title \"{0}\"")]
    AmbiguousBoundary(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    /// Backend reads are idempotent, so these failures are safe to retry
    /// with bounded backoff. Client errors and not-found outcomes are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SearchError::Http(_)
                | SearchError::BackendUnavailable { .. }
                | SearchError::EmbeddingUnavailable(_)
        )
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
