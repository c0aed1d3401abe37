use crate::models::{Candidate, Chunk, ChunkWindow, RangeBounds, RangeSelector};
use tracing::debug;

/// The single bounds-enforcement point. Both the range-only path (whole
/// chunk sequences) and the search paths (candidate lists) funnel through
/// the predicates here.
///
/// Absent bounds are the identity. Page bounds keep any chunk whose page
/// interval intersects the requested interval; chunk-id bounds are exact.
pub fn filter_chunks(chunks: &[Chunk], bounds: &RangeBounds) -> Vec<Chunk> {
    match bounds.selector() {
        None => chunks.to_vec(),
        Some(selector) => chunks
            .iter()
            .filter(|chunk| chunk_in_selector(chunk, &selector))
            .cloned()
            .collect(),
    }
}

/// Restricts a candidate list to the bounds, preserving input order.
/// Page membership is resolved against the document's chunk sequence.
pub fn filter_candidates(
    candidates: Vec<Candidate>,
    bounds: &RangeBounds,
    chunks: &[Chunk],
) -> Vec<Candidate> {
    let Some(selector) = bounds.selector() else {
        return candidates;
    };

    candidates
        .into_iter()
        .filter(|candidate| match find_chunk(chunks, candidate.chunk_id) {
            Some(chunk) => chunk_in_selector(chunk, &selector),
            None => {
                debug!(chunk_id = candidate.chunk_id, "candidate not in chunk sequence, dropped");
                false
            }
        })
        .collect()
}

/// Resolves the chunk-id extent of a non-empty chunk run, for pushing page
/// bounds down into index queries as a chunk-id window.
pub fn window_from_chunks(chunks: &[Chunk]) -> Option<ChunkWindow> {
    let first = chunks.first()?;
    let last = chunks.last()?;
    Some(ChunkWindow {
        start: Some(first.chunk_id),
        end: Some(last.chunk_id),
    })
}

fn chunk_in_selector(chunk: &Chunk, selector: &RangeSelector) -> bool {
    match *selector {
        RangeSelector::ChunkIds { start, end } => {
            start.map_or(true, |bound| chunk.chunk_id >= bound)
                && end.map_or(true, |bound| chunk.chunk_id <= bound)
        }
        RangeSelector::Pages { start, end } => {
            start.map_or(true, |bound| chunk.page_end >= bound)
                && end.map_or(true, |bound| chunk.page_start <= bound)
        }
    }
}

fn find_chunk(chunks: &[Chunk], chunk_id: u64) -> Option<&Chunk> {
    chunks
        .binary_search_by_key(&chunk_id, |chunk| chunk.chunk_id)
        .ok()
        .map(|index| &chunks[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    fn chunk(chunk_id: u64, page_start: u32, page_end: u32) -> Chunk {
        Chunk {
            chunk_id,
            page_start,
            page_end,
            text: format!("chunk {chunk_id}"),
        }
    }

    fn fixture() -> Vec<Chunk> {
        (0..10)
            .map(|id| chunk(id, (id / 2) as u32 + 1, (id / 2) as u32 + 1))
            .collect()
    }

    #[test]
    fn no_bounds_is_identity() {
        let chunks = fixture();
        assert_eq!(filter_chunks(&chunks, &RangeBounds::default()), chunks);

        let candidates = vec![
            Candidate::new(3, 1.0, Source::Lexical),
            Candidate::new(7, 0.5, Source::Vector),
        ];
        let kept = filter_candidates(candidates.clone(), &RangeBounds::default(), &chunks);
        assert_eq!(kept, candidates);
    }

    #[test]
    fn chunk_bounds_win_when_both_selectors_are_supplied() {
        let chunks = fixture();
        let bounds = RangeBounds {
            start_page: Some(1),
            end_page: Some(1),
            start_chunk_id: Some(6),
            end_chunk_id: Some(8),
        };
        let kept = filter_chunks(&chunks, &bounds);
        let ids: Vec<u64> = kept.iter().map(|chunk| chunk.chunk_id).collect();
        assert_eq!(ids, vec![6, 7, 8]);
    }

    #[test]
    fn page_bounds_keep_intersecting_chunks() {
        let chunks = vec![chunk(0, 1, 2), chunk(1, 2, 4), chunk(2, 5, 6), chunk(3, 7, 9)];
        let bounds = RangeBounds {
            start_page: Some(3),
            end_page: Some(5),
            ..RangeBounds::default()
        };
        let kept = filter_chunks(&chunks, &bounds);
        let ids: Vec<u64> = kept.iter().map(|chunk| chunk.chunk_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn open_ended_chunk_bound_filters_one_side() {
        let chunks = fixture();
        let bounds = RangeBounds {
            start_chunk_id: Some(8),
            ..RangeBounds::default()
        };
        let ids: Vec<u64> = filter_chunks(&chunks, &bounds)
            .iter()
            .map(|chunk| chunk.chunk_id)
            .collect();
        assert_eq!(ids, vec![8, 9]);
    }

    #[test]
    fn candidate_order_is_preserved() {
        let chunks = fixture();
        let candidates = vec![
            Candidate::new(9, 0.2, Source::Lexical),
            Candidate::new(2, 0.9, Source::Lexical),
            Candidate::new(5, 0.4, Source::Vector),
        ];
        let bounds = RangeBounds {
            start_chunk_id: Some(2),
            end_chunk_id: Some(9),
            ..RangeBounds::default()
        };
        let kept = filter_candidates(candidates, &bounds, &chunks);
        let ids: Vec<u64> = kept.iter().map(|candidate| candidate.chunk_id).collect();
        assert_eq!(ids, vec![9, 2, 5]);
    }

    #[test]
    fn window_spans_first_and_last_chunk() {
        let chunks = fixture();
        let window = window_from_chunks(&chunks[3..=6]).unwrap();
        assert_eq!(window.start, Some(3));
        assert_eq!(window.end, Some(6));
        assert!(window_from_chunks(&[]).is_none());
    }
}
