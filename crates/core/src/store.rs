use crate::error::SearchError;
use crate::models::{Chunk, RangeBounds};
use crate::range;
use crate::traits::LexicalIndex;

/// Loads one document's full chunk sequence, ordered by chunk id.
///
/// The lexical index is the system of record for stored chunks; an unknown
/// document id comes back as an empty sequence and is surfaced here as
/// `DocumentNotFound`.
pub async fn load<L>(lexical: &L, document_id: &str) -> Result<Vec<Chunk>, SearchError>
where
    L: LexicalIndex + Sync + ?Sized,
{
    let mut chunks = lexical.fetch_chunks(document_id).await?;
    if chunks.is_empty() {
        return Err(SearchError::DocumentNotFound(document_id.to_string()));
    }
    chunks.sort_unstable_by_key(|chunk| chunk.chunk_id);
    Ok(chunks)
}

/// Materializes the sub-sequence selected by the bounds.
///
/// Inverted bounds are `InvalidRange`; a well-formed window that selects
/// nothing yields an empty sequence and the caller decides what emptiness
/// means for its branch.
pub fn slice(chunks: &[Chunk], bounds: &RangeBounds) -> Result<Vec<Chunk>, SearchError> {
    bounds.validate()?;
    Ok(range::filter_chunks(chunks, bounds))
}
