use crate::error::SearchError;
use crate::models::{Chunk, Provenance, SearchOutcome, SearchRequest};
use crate::orchestrator::OrchestratorConfig;
use crate::retry::{with_backoff, Deadline};
use crate::traits::{Judgment, JudgmentCriterion, JudgmentOracle, LexicalIndex, LexicalQuery};
use crate::{assemble, expand, store};
use tracing::{debug, info};

/// Fixed vocabulary that marks the contents section of a prospectus.
pub const DIRECTORY_QUERY: &str = "目录";

/// How many following chunks are shown to the oracle with each candidate.
const PROBE_LOOKAHEAD: usize = 2;

/// Locates the document's table of contents and returns it as one
/// contiguous, readable span.
///
/// A keyword hit on the directory vocabulary is not proof: a references
/// page or a running header can mention the same terms. The oracle picks
/// the candidate that actually begins the contents section; the anchor is
/// then grown forward by a bounded default sized for a typical contents
/// section.
pub async fn extract<L, O>(
    lexical: &L,
    oracle: &O,
    request: &SearchRequest,
    config: &OrchestratorConfig,
    deadline: &Deadline,
) -> Result<SearchOutcome, SearchError>
where
    L: LexicalIndex + Sync,
    O: JudgmentOracle + Sync,
{
    let document_id = request.document_id.as_str();

    let chunks = with_backoff(&config.retry, deadline, "lexical", || {
        store::load(lexical, document_id)
    })
    .await?;

    let query = LexicalQuery {
        text: DIRECTORY_QUERY.to_string(),
        phrase: false,
        top_k: config.directory_candidates,
        window: None,
    };
    let candidates = with_backoff(&config.retry, deadline, "lexical", || {
        lexical.search(document_id, &query)
    })
    .await?;

    if candidates.is_empty() {
        return Err(SearchError::DirectoryNotFound(document_id.to_string()));
    }
    debug!(document_id, count = candidates.len(), "directory candidates retrieved");

    let probes: Vec<String> = candidates
        .iter()
        .map(|candidate| probe_text(candidate.chunk_id, &chunks))
        .collect();

    let judgment = with_backoff(&config.retry, deadline, "oracle", || {
        oracle.judge(&probes, &JudgmentCriterion::ContentsStart)
    })
    .await?;

    let anchor_id = match judgment {
        Judgment::Selected(index) => match candidates.get(index) {
            Some(candidate) => candidate.chunk_id,
            None => return Err(SearchError::DirectoryNotFound(document_id.to_string())),
        },
        Judgment::Undecided => {
            return Err(SearchError::DirectoryNotFound(document_id.to_string()))
        }
    };

    let expand_after = if request.expand_after > 0 {
        request.expand_after
    } else {
        config.directory_expand_after
    };
    let span = expand::expand(&[anchor_id], request.expand_before, expand_after, &chunks);

    info!(
        document_id,
        anchor_id,
        span_len = span.len(),
        "contents section assembled"
    );
    Ok(assemble::assemble(document_id, &span, vec![Provenance::Directory]))
}

/// The candidate chunk plus its next chunks: a true contents anchor is
/// followed by more of the listing, a decoy is not.
fn probe_text(chunk_id: u64, chunks: &[Chunk]) -> String {
    let Ok(position) = chunks.binary_search_by_key(&chunk_id, |chunk| chunk.chunk_id) else {
        return String::new();
    };

    chunks[position..]
        .iter()
        .take(PROBE_LOOKAHEAD + 1)
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, Chunk, RangeBounds, SearchMode, Source};
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FakeLexicalIndex {
        chunks: Vec<Chunk>,
        hits: Vec<Candidate>,
    }

    #[async_trait]
    impl LexicalIndex for FakeLexicalIndex {
        async fn fetch_chunks(&self, _document_id: &str) -> Result<Vec<Chunk>, SearchError> {
            Ok(self.chunks.clone())
        }

        async fn search(
            &self,
            _document_id: &str,
            _query: &LexicalQuery,
        ) -> Result<Vec<Candidate>, SearchError> {
            Ok(self.hits.clone())
        }
    }

    /// Picks the probe that reads like a contents listing: several headed
    /// parts visible in one probe.
    struct ListingOracle;

    #[async_trait]
    impl JudgmentOracle for ListingOracle {
        async fn judge(
            &self,
            candidates: &[String],
            _criterion: &JudgmentCriterion,
        ) -> Result<Judgment, SearchError> {
            let listing = candidates
                .iter()
                .position(|probe| probe.matches("部分").count() >= 2);
            Ok(listing.map(Judgment::Selected).unwrap_or(Judgment::Undecided))
        }
    }

    fn chunk(chunk_id: u64, page: u32, text: &str) -> Chunk {
        Chunk {
            chunk_id,
            page_start: page,
            page_end: page,
            text: text.to_string(),
        }
    }

    fn request() -> SearchRequest {
        SearchRequest {
            document_id: "doc-1".to_string(),
            mode: SearchMode::Directory,
            query: None,
            bounds: RangeBounds::default(),
            expand_before: 0,
            expand_after: 0,
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            directory_expand_after: 2,
            retry: RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
            ..OrchestratorConfig::default()
        }
    }

    fn fixture() -> Vec<Chunk> {
        vec![
            chunk(0, 1, "封面"),
            chunk(1, 2, "目 录"),
            chunk(2, 2, "第一部分 释义 ...... 4"),
            chunk(3, 3, "第二部分 基金管理人 ...... 9"),
            chunk(4, 4, "正文开始"),
            chunk(5, 5, "脚注：详见目录说明"),
            chunk(6, 5, "其他内容"),
            chunk(7, 6, "结尾"),
        ]
    }

    #[tokio::test]
    async fn true_contents_anchor_beats_the_decoy() {
        let lexical = FakeLexicalIndex {
            chunks: fixture(),
            // the decoy footnote ranks first on raw keyword score
            hits: vec![
                Candidate::new(5, 11.0, Source::Lexical),
                Candidate::new(1, 9.0, Source::Lexical),
            ],
        };
        let deadline = Deadline::new(Duration::from_secs(5));

        let outcome = extract(&lexical, &ListingOracle, &request(), &config(), &deadline)
            .await
            .unwrap();

        assert_eq!(outcome.chunk_range.unwrap().start, 1);
        assert_eq!(outcome.chunk_range.unwrap().end, 3);
        assert!(outcome.text.starts_with("目 录"));
        assert_eq!(outcome.provenance, vec![Provenance::Directory]);
    }

    #[tokio::test]
    async fn no_plausible_candidate_is_directory_not_found() {
        let lexical = FakeLexicalIndex {
            chunks: fixture(),
            hits: vec![Candidate::new(5, 11.0, Source::Lexical)],
        };
        let deadline = Deadline::new(Duration::from_secs(5));

        let result = extract(&lexical, &ListingOracle, &request(), &config(), &deadline).await;
        assert!(matches!(result, Err(SearchError::DirectoryNotFound(_))));
    }

    #[tokio::test]
    async fn no_keyword_hits_is_directory_not_found() {
        let lexical = FakeLexicalIndex {
            chunks: fixture(),
            hits: Vec::new(),
        };
        let deadline = Deadline::new(Duration::from_secs(5));

        let result = extract(&lexical, &ListingOracle, &request(), &config(), &deadline).await;
        assert!(matches!(result, Err(SearchError::DirectoryNotFound(_))));
    }
}
