use crate::models::{Chunk, ChunkIdRange, PageRange, Provenance, SearchOutcome};

/// Separator between chunk texts in an assembled span.
pub const SPAN_SEPARATOR: &str = "\n\n";

/// Packages a contiguous span into the citable response shape.
///
/// Page and chunk ranges are recomputed from the span itself so the
/// response always reflects the content actually returned. Side-effect
/// free.
pub fn assemble(document_id: &str, span: &[Chunk], provenance: Vec<Provenance>) -> SearchOutcome {
    let (Some(first), Some(last)) = (span.first(), span.last()) else {
        return SearchOutcome::empty(document_id, provenance);
    };

    let text = span
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(SPAN_SEPARATOR);

    let page_start = span.iter().map(|chunk| chunk.page_start).min().unwrap_or(first.page_start);
    let page_end = span.iter().map(|chunk| chunk.page_end).max().unwrap_or(last.page_end);

    SearchOutcome {
        document_id: document_id.to_string(),
        text,
        page_range: Some(PageRange {
            start: page_start,
            end: page_end,
        }),
        chunk_range: Some(ChunkIdRange {
            start: first.chunk_id,
            end: last.chunk_id,
        }),
        provenance,
        is_empty: false,
    }
}
