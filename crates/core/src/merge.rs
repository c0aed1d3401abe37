use crate::models::{Candidate, Source};
use std::collections::BTreeMap;

/// Fuses lexical and vector hit lists into one ranked, deduplicated list.
///
/// Raw scores are not comparable across searchers, so each source list is
/// min-max scaled to [0,1] on its own. A chunk surfaced by both searchers
/// keeps one entry whose score is the sum of its two normalized scores and
/// whose source tags are the union, lexical first. Order: descending merged
/// score, ascending chunk id on ties. Pure function of its inputs.
pub fn merge(lexical: &[Candidate], vector: &[Candidate]) -> Vec<Candidate> {
    let mut merged: BTreeMap<u64, Candidate> = BTreeMap::new();
    accumulate(&mut merged, lexical, Source::Lexical);
    accumulate(&mut merged, vector, Source::Vector);

    let mut ranked: Vec<Candidate> = merged.into_values().collect();
    ranked.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.chunk_id.cmp(&right.chunk_id))
    });
    ranked
}

fn accumulate(target: &mut BTreeMap<u64, Candidate>, hits: &[Candidate], source: Source) {
    for (chunk_id, normalized) in normalize(hits) {
        let entry = target.entry(chunk_id).or_insert(Candidate {
            chunk_id,
            score: 0.0,
            sources: Vec::new(),
        });
        if entry.sources.contains(&source) {
            continue;
        }
        entry.score += normalized;
        entry.sources.push(source);
    }
}

/// Min-max scaling within one source's result set. A flat list (every score
/// equal, including a single hit) has no spread to scale and maps every
/// member to 1.0.
fn normalize(hits: &[Candidate]) -> Vec<(u64, f64)> {
    let Some(first) = hits.first() else {
        return Vec::new();
    };

    let mut min = first.score;
    let mut max = first.score;
    for hit in hits {
        min = min.min(hit.score);
        max = max.max(hit.score);
    }
    let spread = max - min;

    hits.iter()
        .map(|hit| {
            let normalized = if spread > 0.0 {
                (hit.score - min) / spread
            } else {
                1.0
            };
            (hit.chunk_id, normalized)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(chunk_id: u64, score: f64, source: Source) -> Candidate {
        Candidate::new(chunk_id, score, source)
    }

    #[test]
    fn agreement_outranks_single_source_hits() {
        let lexical = vec![
            candidate(1, 12.0, Source::Lexical),
            candidate(2, 8.0, Source::Lexical),
            candidate(3, 2.0, Source::Lexical),
        ];
        let vector = vec![
            candidate(2, 0.9, Source::Vector),
            candidate(4, 0.8, Source::Vector),
            candidate(5, 0.1, Source::Vector),
        ];

        let ranked = merge(&lexical, &vector);
        assert_eq!(ranked[0].chunk_id, 2);
        assert_eq!(ranked[0].sources, vec![Source::Lexical, Source::Vector]);
    }

    #[test]
    fn merged_score_is_at_least_either_normalized_score() {
        let lexical = vec![
            candidate(1, 10.0, Source::Lexical),
            candidate(2, 5.0, Source::Lexical),
            candidate(3, 1.0, Source::Lexical),
        ];
        let vector = vec![
            candidate(2, 0.7, Source::Vector),
            candidate(3, 0.4, Source::Vector),
            candidate(9, 0.2, Source::Vector),
        ];

        let lexical_only = merge(&lexical, &[]);
        let vector_only = merge(&[], &vector);
        let ranked = merge(&lexical, &vector);

        for shared_id in [2u64, 3u64] {
            let merged_score = ranked
                .iter()
                .find(|entry| entry.chunk_id == shared_id)
                .map(|entry| entry.score)
                .unwrap();
            let lexical_score = lexical_only
                .iter()
                .find(|entry| entry.chunk_id == shared_id)
                .map(|entry| entry.score)
                .unwrap();
            let vector_score = vector_only
                .iter()
                .find(|entry| entry.chunk_id == shared_id)
                .map(|entry| entry.score)
                .unwrap();
            assert!(merged_score >= lexical_score);
            assert!(merged_score >= vector_score);
        }
    }

    #[test]
    fn output_is_invariant_under_input_permutation() {
        let lexical = vec![
            candidate(1, 3.0, Source::Lexical),
            candidate(2, 7.0, Source::Lexical),
            candidate(3, 5.0, Source::Lexical),
        ];
        let vector = vec![
            candidate(3, 0.2, Source::Vector),
            candidate(4, 0.9, Source::Vector),
        ];

        let mut lexical_shuffled = lexical.clone();
        lexical_shuffled.reverse();
        let mut vector_shuffled = vector.clone();
        vector_shuffled.reverse();

        assert_eq!(
            merge(&lexical, &vector),
            merge(&lexical_shuffled, &vector_shuffled)
        );
    }

    #[test]
    fn ties_break_by_ascending_chunk_id() {
        let lexical = vec![
            candidate(7, 4.0, Source::Lexical),
            candidate(3, 4.0, Source::Lexical),
        ];
        let ranked = merge(&lexical, &[]);
        let ids: Vec<u64> = ranked.iter().map(|entry| entry.chunk_id).collect();
        assert_eq!(ids, vec![3, 7]);
    }

    #[test]
    fn flat_lists_normalize_to_full_weight() {
        let lexical = vec![candidate(1, 2.5, Source::Lexical)];
        let ranked = merge(&lexical, &[]);
        assert_eq!(ranked[0].score, 1.0);
    }
}
