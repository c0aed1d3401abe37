use crate::error::SearchError;
use crate::models::{Candidate, Chunk, ChunkWindow};
use async_trait::async_trait;

/// Query shape for the lexical index. Title lookups issue phrase queries,
/// content lookups fuzzy best-fields queries.
#[derive(Debug, Clone)]
pub struct LexicalQuery {
    pub text: String,
    pub phrase: bool,
    pub top_k: usize,
    pub window: Option<ChunkWindow>,
}

#[async_trait]
pub trait LexicalIndex {
    /// Full chunk sequence of one document, ordered by chunk id.
    /// Unknown documents yield an empty sequence.
    async fn fetch_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, SearchError>;

    /// Ranked keyword hits, descending score with ascending chunk id as the
    /// tie-break. A window is pushed into the index query, never
    /// post-filtered. No match is an empty list, not an error.
    async fn search(
        &self,
        document_id: &str,
        query: &LexicalQuery,
    ) -> Result<Vec<Candidate>, SearchError>;
}

#[async_trait]
pub trait VectorIndex {
    /// Ranked similarity hits for an embedded query, descending similarity.
    async fn search(
        &self,
        document_id: &str,
        query_text: &str,
        top_k: usize,
        window: Option<ChunkWindow>,
    ) -> Result<Vec<Candidate>, SearchError>;
}

/// What the judgment oracle is asked to decide over a candidate list.
#[derive(Debug, Clone)]
pub enum JudgmentCriterion {
    /// Which candidate begins the document's table of contents.
    ContentsStart,
    /// Which candidate holds the named section heading followed by its body.
    SectionStart { title: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    /// Zero-based index into the candidate list that was judged.
    Selected(usize),
    Undecided,
}

/// A narrow, swappable decision capability. Implementations may be a remote
/// reasoning model, a smaller classifier, or a rule-based heuristic; callers
/// depend only on this contract.
#[async_trait]
pub trait JudgmentOracle {
    async fn judge(
        &self,
        candidates: &[String],
        criterion: &JudgmentCriterion,
    ) -> Result<Judgment, SearchError>;
}

#[async_trait]
pub trait DocumentResolver {
    /// Maps a fund code and offering kind to a stored document id.
    async fn resolve(&self, fund_code: &str, is_expansion: bool) -> Result<String, SearchError>;
}
