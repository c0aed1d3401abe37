use crate::error::SearchError;
use serde::{Deserialize, Serialize};

/// Instruction text that requests the document's table of contents.
pub const DIRECTORY_INSTRUCTION: &str = "目录";

const TITLE_PREFIXES: [&str; 2] = ["章节标题检索：", "章节标题检索:"];
const CONTENT_PREFIXES: [&str; 2] = ["内容检索：", "内容检索:"];

/// A contiguous unit of document text with stable identity and page
/// metadata. The atomic unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: u64,
    pub page_start: u32,
    pub page_end: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub chunk_count: u64,
    pub page_count: u32,
}

impl Document {
    pub fn from_chunks(document_id: impl Into<String>, chunks: &[Chunk]) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_count: chunks.len() as u64,
            page_count: chunks.iter().map(|chunk| chunk.page_end).max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SearchMode {
    Directory,
    RangeOnly,
    TitleSearch,
    ContentSearch,
}

/// Splits a free-text instruction into a mode and the query text it carries.
///
/// Both full-width and half-width prefix separators are accepted; unknown
/// non-empty instructions fall back to content search.
pub fn classify_instruction(search_info: &str) -> (SearchMode, Option<String>) {
    let raw = search_info.trim();

    if raw.is_empty() {
        return (SearchMode::RangeOnly, None);
    }
    if raw == DIRECTORY_INSTRUCTION {
        return (SearchMode::Directory, None);
    }

    for prefix in TITLE_PREFIXES {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return (SearchMode::TitleSearch, Some(rest.trim().to_string()));
        }
    }
    for prefix in CONTENT_PREFIXES {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return (SearchMode::ContentSearch, Some(rest.trim().to_string()));
        }
    }

    (SearchMode::ContentSearch, Some(raw.to_string()))
}

/// Optional page and chunk-id windows restricting a request.
///
/// The two selector kinds are mutually exclusive: when both are supplied,
/// chunk-id bounds win and the page bounds are ignored.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RangeBounds {
    pub start_page: Option<u32>,
    pub end_page: Option<u32>,
    pub start_chunk_id: Option<u64>,
    pub end_chunk_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSelector {
    ChunkIds {
        start: Option<u64>,
        end: Option<u64>,
    },
    Pages {
        start: Option<u32>,
        end: Option<u32>,
    },
}

impl RangeBounds {
    pub fn is_unbounded(&self) -> bool {
        self.start_page.is_none()
            && self.end_page.is_none()
            && self.start_chunk_id.is_none()
            && self.end_chunk_id.is_none()
    }

    /// The effective selector, applying chunk-id precedence.
    pub fn selector(&self) -> Option<RangeSelector> {
        if self.start_chunk_id.is_some() || self.end_chunk_id.is_some() {
            return Some(RangeSelector::ChunkIds {
                start: self.start_chunk_id,
                end: self.end_chunk_id,
            });
        }
        if self.start_page.is_some() || self.end_page.is_some() {
            return Some(RangeSelector::Pages {
                start: self.start_page,
                end: self.end_page,
            });
        }
        None
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if let (Some(start), Some(end)) = (self.start_chunk_id, self.end_chunk_id) {
            if start > end {
                return Err(SearchError::InvalidRange(format!(
                    "start_chunk_id {start} is greater than end_chunk_id {end}"
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.start_page, self.end_page) {
            if start > end {
                return Err(SearchError::InvalidRange(format!(
                    "start_page {start} is greater than end_page {end}"
                )));
            }
        }
        Ok(())
    }
}

/// Inclusive chunk-id window pushed down into backend index queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// One orchestration call, already bound to a resolved document.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub document_id: String,
    pub mode: SearchMode,
    pub query: Option<String>,
    pub bounds: RangeBounds,
    pub expand_before: u64,
    pub expand_after: u64,
}

impl SearchRequest {
    /// Builds a request by classifying a raw tool instruction.
    pub fn from_instruction(
        document_id: impl Into<String>,
        search_info: &str,
        bounds: RangeBounds,
        expand_before: u64,
        expand_after: u64,
    ) -> Self {
        let (mode, query) = classify_instruction(search_info);
        Self {
            document_id: document_id.into(),
            mode,
            query,
            bounds,
            expand_before,
            expand_after,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Lexical,
    Vector,
}

/// A scored hit from one searcher. Scores are searcher-specific and not
/// comparable across sources until normalized by the merger.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk_id: u64,
    pub score: f64,
    pub sources: Vec<Source>,
}

impl Candidate {
    pub fn new(chunk_id: u64, score: f64, source: Source) -> Self {
        Self {
            chunk_id,
            score,
            sources: vec![source],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Lexical,
    Vector,
    Directory,
    Range,
    BoundaryFallback,
}

impl From<Source> for Provenance {
    fn from(source: Source) -> Self {
        match source {
            Source::Lexical => Provenance::Lexical,
            Source::Vector => Provenance::Vector,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkIdRange {
    pub start: u64,
    pub end: u64,
}

/// The structured, citable result of one orchestration call.
///
/// A legitimately empty match is not an error: it comes back with empty
/// text, absent ranges, and `is_empty` set, so the caller can decide to
/// broaden scope on a follow-up request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub document_id: String,
    pub text: String,
    pub page_range: Option<PageRange>,
    pub chunk_range: Option<ChunkIdRange>,
    pub provenance: Vec<Provenance>,
    pub is_empty: bool,
}

impl SearchOutcome {
    pub fn empty(document_id: impl Into<String>, provenance: Vec<Provenance>) -> Self {
        Self {
            document_id: document_id.into(),
            text: String::new(),
            page_range: None,
            chunk_range: None,
            provenance,
            is_empty: true,
        }
    }
}
