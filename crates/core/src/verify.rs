use crate::error::SearchError;
use crate::models::{Candidate, Chunk};
use crate::traits::{Judgment, JudgmentCriterion, JudgmentOracle};
use tracing::debug;

/// Outcome of boundary verification for a title lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Selected(u64),
    Undecided,
}

/// Resolves which candidate truly starts the named section.
///
/// Each candidate is presented to the oracle with its immediate
/// neighbours as context, so a heading can be told apart from a mere
/// reference to it. The oracle's answer is mapped back onto the candidate
/// list; a selection outside that list collapses to `Undecided` — this
/// component never emits a chunk id it was not given.
pub async fn verify<O>(
    oracle: &O,
    candidates: &[Candidate],
    chunks: &[Chunk],
    title: &str,
) -> Result<Verdict, SearchError>
where
    O: JudgmentOracle + Sync + ?Sized,
{
    match candidates {
        [] => return Ok(Verdict::Undecided),
        [only] => return Ok(Verdict::Selected(only.chunk_id)),
        _ => {}
    }

    let probes: Vec<String> = candidates
        .iter()
        .map(|candidate| probe_text(candidate.chunk_id, chunks))
        .collect();
    let criterion = JudgmentCriterion::SectionStart {
        title: title.to_string(),
    };

    match oracle.judge(&probes, &criterion).await? {
        Judgment::Selected(index) => match candidates.get(index) {
            Some(candidate) => Ok(Verdict::Selected(candidate.chunk_id)),
            None => {
                debug!(index, total = candidates.len(), "oracle selected outside candidate list");
                Ok(Verdict::Undecided)
            }
        },
        Judgment::Undecided => Ok(Verdict::Undecided),
    }
}

fn probe_text(chunk_id: u64, chunks: &[Chunk]) -> String {
    let position = chunks
        .binary_search_by_key(&chunk_id, |chunk| chunk.chunk_id)
        .ok();

    let Some(position) = position else {
        return String::new();
    };

    let mut parts = Vec::with_capacity(3);
    if position > 0 {
        parts.push(format!("[context-before] {}", chunks[position - 1].text));
    }
    parts.push(format!("[target] {}", chunks[position].text));
    if let Some(next) = chunks.get(position + 1) {
        parts.push(format!("[context-after] {}", next.text));
    }
    parts.join("\n")
}
