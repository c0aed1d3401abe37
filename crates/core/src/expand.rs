use crate::models::Chunk;

/// Grows an anchor chunk set into a contiguous span.
///
/// The window is `min(anchors) - expand_before ..= max(anchors) +
/// expand_after`, clamped to the document's chunk-id extent. Out-of-bounds
/// expansion is clamped by policy, never an error. The realized span, not
/// the request, is what downstream bookkeeping is computed from.
pub fn expand(
    anchor_ids: &[u64],
    expand_before: u64,
    expand_after: u64,
    chunks: &[Chunk],
) -> Vec<Chunk> {
    let (Some(first), Some(last)) = (chunks.first(), chunks.last()) else {
        return Vec::new();
    };
    let (Some(min_anchor), Some(max_anchor)) =
        (anchor_ids.iter().min(), anchor_ids.iter().max())
    else {
        return Vec::new();
    };

    let start = min_anchor
        .saturating_sub(expand_before)
        .max(first.chunk_id);
    let end = max_anchor
        .saturating_add(expand_after)
        .min(last.chunk_id);

    chunks
        .iter()
        .filter(|chunk| chunk.chunk_id >= start && chunk.chunk_id <= end)
        .cloned()
        .collect()
}
