use crate::error::SearchError;
use crate::models::{
    Candidate, Chunk, ChunkWindow, Document, Provenance, RangeSelector, SearchMode, SearchOutcome,
    SearchRequest,
};
use crate::retry::{with_backoff, Deadline, RetryPolicy};
use crate::traits::{JudgmentOracle, LexicalIndex, LexicalQuery, VectorIndex};
use crate::verify::{self, Verdict};
use crate::{directory, expand, merge, range, store};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Candidate budget per searcher.
    pub top_k: usize,
    /// How many top merged candidates are shown to the boundary verifier.
    pub verifier_candidates: usize,
    /// Candidate budget for the directory vocabulary query.
    pub directory_candidates: usize,
    /// Default forward expansion from a contents anchor, sized to cover a
    /// typical contents section.
    pub directory_expand_after: u64,
    /// When the verifier is undecided, degrade to the top merged candidate
    /// instead of failing the request.
    pub fallback_on_undecided: bool,
    /// Wall-clock budget for one orchestration call.
    pub deadline: Duration,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            verifier_candidates: 5,
            directory_candidates: 8,
            directory_expand_after: 7,
            fallback_on_undecided: true,
            deadline: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Top-level request handler. Classifies the instruction, drives the
/// searchers and the judgment oracle, and returns one citable span.
///
/// Stateless per call: switching strategy after an empty or unsatisfying
/// result is the caller's move, on an independent follow-up request.
pub struct SearchOrchestrator<L, V, O> {
    lexical: L,
    vector: V,
    oracle: O,
    config: OrchestratorConfig,
}

impl<L, V, O> SearchOrchestrator<L, V, O>
where
    L: LexicalIndex + Send + Sync,
    V: VectorIndex + Send + Sync,
    O: JudgmentOracle + Send + Sync,
{
    pub fn new(lexical: L, vector: V, oracle: O) -> Self {
        Self::with_config(lexical, vector, oracle, OrchestratorConfig::default())
    }

    pub fn with_config(lexical: L, vector: V, oracle: O, config: OrchestratorConfig) -> Self {
        Self {
            lexical,
            vector,
            oracle,
            config,
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        request.bounds.validate()?;
        self.validate_branch(request)?;

        let deadline = Deadline::new(self.config.deadline);
        info!(
            document_id = %request.document_id,
            mode = ?request.mode,
            "dispatching retrieval request"
        );

        match request.mode {
            SearchMode::Directory => {
                directory::extract(&self.lexical, &self.oracle, request, &self.config, &deadline)
                    .await
            }
            SearchMode::RangeOnly => self.range_only(request, &deadline).await,
            SearchMode::TitleSearch | SearchMode::ContentSearch => {
                self.search_branch(request, &deadline).await
            }
        }
    }

    /// Client errors are rejected before any backend call is made.
    fn validate_branch(&self, request: &SearchRequest) -> Result<(), SearchError> {
        match request.mode {
            SearchMode::RangeOnly => {
                if request.bounds.is_unbounded() {
                    return Err(SearchError::InvalidRequest(
                        "empty search_info requires page or chunk-id bounds".to_string(),
                    ));
                }
            }
            SearchMode::TitleSearch | SearchMode::ContentSearch => {
                if request
                    .query
                    .as_deref()
                    .map_or(true, |query| query.trim().is_empty())
                {
                    return Err(SearchError::InvalidRequest(
                        "search instruction carries no query text".to_string(),
                    ));
                }
            }
            SearchMode::Directory => {}
        }
        Ok(())
    }

    async fn range_only(
        &self,
        request: &SearchRequest,
        deadline: &Deadline,
    ) -> Result<SearchOutcome, SearchError> {
        let chunks = self.load_chunks(request, deadline).await?;
        let scoped = store::slice(&chunks, &request.bounds)?;

        let Some(window) = range::window_from_chunks(&scoped) else {
            debug!(document_id = %request.document_id, "range selected no chunks");
            return Ok(SearchOutcome::empty(
                &request.document_id,
                vec![Provenance::Range],
            ));
        };

        let anchors: Vec<u64> = window.start.into_iter().chain(window.end).collect();
        let span = expand::expand(
            &anchors,
            request.expand_before,
            request.expand_after,
            &chunks,
        );
        Ok(assemble_span(request, &span, vec![Provenance::Range]))
    }

    async fn search_branch(
        &self,
        request: &SearchRequest,
        deadline: &Deadline,
    ) -> Result<SearchOutcome, SearchError> {
        // branch validation guarantees query text is present
        let query = request.query.as_deref().unwrap_or_default();
        let chunks = self.load_chunks(request, deadline).await?;

        // Page bounds are resolved against the loaded sequence so the
        // searchers receive one uniform chunk-id window.
        let window = match request.bounds.selector() {
            None => None,
            Some(RangeSelector::ChunkIds { start, end }) => Some(ChunkWindow { start, end }),
            Some(RangeSelector::Pages { .. }) => {
                let scoped = range::filter_chunks(&chunks, &request.bounds);
                match range::window_from_chunks(&scoped) {
                    Some(window) => Some(window),
                    None => {
                        return Ok(SearchOutcome::empty(&request.document_id, Vec::new()));
                    }
                }
            }
        };

        let candidates = match request.mode {
            SearchMode::TitleSearch => self.title_candidates(request, query, window, deadline).await?,
            _ => self.hybrid_candidates(request, query, window, deadline).await?,
        };

        let candidates = range::filter_candidates(candidates, &request.bounds, &chunks);
        if candidates.is_empty() {
            debug!(document_id = %request.document_id, "no candidates after range filtering");
            return Ok(SearchOutcome::empty(&request.document_id, Vec::new()));
        }

        let (anchor_id, provenance) = match request.mode {
            SearchMode::TitleSearch => {
                self.select_title_anchor(request, query, &candidates, &chunks, deadline)
                    .await?
            }
            _ => {
                let top = &candidates[0];
                (top.chunk_id, provenance_of(top))
            }
        };

        let span = expand::expand(
            &[anchor_id],
            request.expand_before,
            request.expand_after,
            &chunks,
        );
        Ok(assemble_span(request, &span, provenance))
    }

    /// Title lookups are lexical-first: a phrase hit on the heading is the
    /// strongest signal. The vector searcher only runs when the phrase
    /// query comes back empty.
    async fn title_candidates(
        &self,
        request: &SearchRequest,
        query: &str,
        window: Option<ChunkWindow>,
        deadline: &Deadline,
    ) -> Result<Vec<Candidate>, SearchError> {
        let lexical_query = LexicalQuery {
            text: query.to_string(),
            phrase: true,
            top_k: self.config.top_k,
            window,
        };
        let lexical_hits = with_backoff(&self.config.retry, deadline, "lexical", || {
            self.lexical.search(&request.document_id, &lexical_query)
        })
        .await?;

        if !lexical_hits.is_empty() {
            return Ok(merge::merge(&lexical_hits, &[]));
        }

        debug!(document_id = %request.document_id, "phrase query empty, falling back to vector");
        let vector_hits = with_backoff(&self.config.retry, deadline, "vector", || {
            self.vector
                .search(&request.document_id, query, self.config.top_k, window)
        })
        .await?;
        Ok(merge::merge(&[], &vector_hits))
    }

    /// Content lookups fan out to both searchers concurrently and join on
    /// the merger.
    async fn hybrid_candidates(
        &self,
        request: &SearchRequest,
        query: &str,
        window: Option<ChunkWindow>,
        deadline: &Deadline,
    ) -> Result<Vec<Candidate>, SearchError> {
        let lexical_query = LexicalQuery {
            text: query.to_string(),
            phrase: false,
            top_k: self.config.top_k,
            window,
        };

        let (lexical_hits, vector_hits) = tokio::try_join!(
            with_backoff(&self.config.retry, deadline, "lexical", || {
                self.lexical.search(&request.document_id, &lexical_query)
            }),
            with_backoff(&self.config.retry, deadline, "vector", || {
                self.vector
                    .search(&request.document_id, query, self.config.top_k, window)
            }),
        )?;

        debug!(
            lexical = lexical_hits.len(),
            vector = vector_hits.len(),
            "merging searcher candidates"
        );
        Ok(merge::merge(&lexical_hits, &vector_hits))
    }

    async fn select_title_anchor(
        &self,
        request: &SearchRequest,
        title: &str,
        candidates: &[Candidate],
        chunks: &[Chunk],
        deadline: &Deadline,
    ) -> Result<(u64, Vec<Provenance>), SearchError> {
        let shortlist = &candidates[..candidates.len().min(self.config.verifier_candidates)];

        let verdict = with_backoff(&self.config.retry, deadline, "oracle", || {
            verify::verify(&self.oracle, shortlist, chunks, title)
        })
        .await?;

        match verdict {
            Verdict::Selected(anchor_id) => {
                let provenance = candidates
                    .iter()
                    .find(|candidate| candidate.chunk_id == anchor_id)
                    .map(provenance_of)
                    .unwrap_or_default();
                Ok((anchor_id, provenance))
            }
            Verdict::Undecided => {
                if !self.config.fallback_on_undecided {
                    return Err(SearchError::AmbiguousBoundary(title.to_string()));
                }
                let top = &candidates[0];
                let mut provenance = provenance_of(top);
                provenance.push(Provenance::BoundaryFallback);
                info!(
                    document_id = %request.document_id,
                    anchor_id = top.chunk_id,
                    "boundary undecided, degrading to top candidate"
                );
                Ok((top.chunk_id, provenance))
            }
        }
    }

    async fn load_chunks(
        &self,
        request: &SearchRequest,
        deadline: &Deadline,
    ) -> Result<Vec<Chunk>, SearchError> {
        let chunks = with_backoff(&self.config.retry, deadline, "lexical", || {
            store::load(&self.lexical, &request.document_id)
        })
        .await?;
        let document = Document::from_chunks(&request.document_id, &chunks);
        debug!(
            chunk_count = document.chunk_count,
            page_count = document.page_count,
            "document loaded"
        );
        Ok(chunks)
    }
}

fn provenance_of(candidate: &Candidate) -> Vec<Provenance> {
    candidate
        .sources
        .iter()
        .map(|source| Provenance::from(*source))
        .collect()
}

fn assemble_span(
    request: &SearchRequest,
    span: &[Chunk],
    provenance: Vec<Provenance>,
) -> SearchOutcome {
    crate::assemble::assemble(&request.document_id, span, provenance)
}
