//! Relevance selection: which chunks of a loaded document to show the
//! answer generator.
//!
//! The selector operates purely on a chunk slice and a question, with no
//! store or configuration dependencies. Questions are first classified by
//! [`classify_query`]:
//!
//! - **Locator** questions reference a numbered page, experiment, session,
//!   or lab ("what is on page 3?"). No page-to-chunk mapping exists, so
//!   the *comprehensive* strategy takes the first `locator_chunks` chunks
//!   in order.
//! - **General** questions use the *keyword* strategy described below.
//!
//! # Keyword Scoring
//!
//! For each chunk, with the question lowercased:
//!
//! 1. `+exact_phrase_weight` if the chunk contains the whole question.
//! 2. `+keyword_weight` per whole-word occurrence of each question word
//!    with at least `min_word_len` characters.
//! 3. `+proximity_weight` per match of two consecutive question words
//!    within `proximity_window` characters.
//! 4. `+(total - index) × position_weight`, a tie-break toward early chunks.
//!
//! The top `top_k` chunks are re-sorted into document order. If the best
//! score is below `min_score`, the first `top_k` chunks are used instead.
//!
//! Selected chunks are joined with [`CONTINUATION_MARKER`] and the result
//! is truncated to `max_context_chars`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::Chunk;
use crate::text::truncate_chars;

/// Separator inserted between reassembled chunks to signal a content gap.
pub const CONTINUATION_MARKER: &str = "\n\n[...document continues...]\n\n";

static LOCATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(page|exp(?:eriment)?|session|lab(?:\s*exercise)?)\s*(?:no\.?|number)?\s*(\d+)",
    )
    .expect("valid regex")
});

/// The kind of numbered section a locator question points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Page,
    Experiment,
    Session,
    Lab,
}

/// Classification of a free-text question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryClass {
    /// References an explicit numbered section.
    Locator { section: SectionKind, number: u32 },
    /// Anything else.
    General,
}

/// How the context for a request was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The session has a single chunk; it is used as-is.
    Single,
    /// Leading chunks, for locator questions and quizzes.
    Comprehensive,
    /// Top-scoring chunks by keyword relevance.
    Keyword,
    /// Keyword scoring found nothing; leading chunks instead.
    Fallback,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Single => "single",
            Strategy::Comprehensive => "comprehensive",
            Strategy::Keyword => "keyword",
            Strategy::Fallback => "fallback",
        }
    }
}

/// Heuristic tuning for chunk selection.
///
/// The defaults are inherited tuning with no documented derivation; they
/// are exposed so deployments can adjust them.
#[derive(Debug, Clone)]
pub struct SelectionParams {
    /// Hard cap on the assembled context, in characters.
    pub max_context_chars: usize,
    /// Chunks taken by the comprehensive strategy.
    pub locator_chunks: usize,
    /// Chunks taken by the keyword and fallback strategies.
    pub top_k: usize,
    pub exact_phrase_weight: f64,
    pub keyword_weight: f64,
    pub proximity_weight: f64,
    /// Maximum characters between two consecutive question words.
    pub proximity_window: usize,
    pub position_weight: f64,
    /// Best scores below this fall back to the leading chunks.
    pub min_score: f64,
    /// Question words shorter than this are ignored.
    pub min_word_len: usize,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            max_context_chars: 18_000,
            locator_chunks: 4,
            top_k: 3,
            exact_phrase_weight: 100.0,
            keyword_weight: 5.0,
            proximity_weight: 10.0,
            proximity_window: 50,
            position_weight: 0.5,
            min_score: 5.0,
            min_word_len: 3,
        }
    }
}

/// Score assigned to one chunk by the keyword strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkScore {
    pub index: usize,
    pub score: f64,
}

/// The chosen context and how it was chosen.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub strategy: Strategy,
    /// Indices of the selected chunks, in document order.
    pub chunk_indices: Vec<usize>,
    /// Selected chunk text joined with [`CONTINUATION_MARKER`], bounded
    /// to `max_context_chars`.
    pub context: String,
    /// Highest keyword scores, best first. Empty for non-keyword strategies.
    pub top_scores: Vec<ChunkScore>,
}

/// Classify a question as a locator or general query.
pub fn classify_query(question: &str) -> QueryClass {
    let Some(caps) = LOCATOR.captures(question) else {
        return QueryClass::General;
    };
    let keyword = caps[1].to_lowercase();
    let section = if keyword.starts_with("page") {
        SectionKind::Page
    } else if keyword.starts_with("exp") {
        SectionKind::Experiment
    } else if keyword.starts_with("session") {
        SectionKind::Session
    } else {
        SectionKind::Lab
    };
    match caps[2].parse::<u32>() {
        Ok(number) => QueryClass::Locator { section, number },
        Err(_) => QueryClass::General,
    }
}

/// Choose the context for answering `question` from `chunks`.
pub fn select_context(question: &str, chunks: &[Chunk], params: &SelectionParams) -> Selection {
    if chunks.len() <= 1 {
        return single(chunks, params);
    }

    match classify_query(question) {
        QueryClass::Locator { .. } => leading(chunks, params.locator_chunks, Strategy::Comprehensive, params),
        QueryClass::General => keyword(question, chunks, params),
    }
}

/// Choose the context for quiz generation: the whole document when it is
/// one chunk, otherwise the leading `locator_chunks` chunks.
pub fn select_quiz_context(chunks: &[Chunk], params: &SelectionParams) -> Selection {
    if chunks.len() <= 1 {
        return single(chunks, params);
    }
    leading(chunks, params.locator_chunks, Strategy::Comprehensive, params)
}

/// Score every chunk against `question`. Results are in chunk order.
pub fn score_chunks(question: &str, chunks: &[Chunk], params: &SelectionParams) -> Vec<ChunkScore> {
    let query_lower = question.trim().to_lowercase();
    let words = query_words(&query_lower, params.min_word_len);

    let word_patterns: Vec<Regex> = words
        .iter()
        .filter_map(|w| Regex::new(&format!(r"\b{}\b", regex::escape(w))).ok())
        .collect();
    let proximity_patterns: Vec<Regex> = words
        .windows(2)
        .filter_map(|pair| {
            Regex::new(&format!(
                "{}.{{0,{}}}{}",
                regex::escape(&pair[0]),
                params.proximity_window,
                regex::escape(&pair[1])
            ))
            .ok()
        })
        .collect();

    let total = chunks.len();
    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let chunk_lower = chunk.text.to_lowercase();
            let mut score = 0.0;

            if !query_lower.is_empty() && chunk_lower.contains(&query_lower) {
                score += params.exact_phrase_weight;
            }
            for re in &word_patterns {
                score += re.find_iter(&chunk_lower).count() as f64 * params.keyword_weight;
            }
            for re in &proximity_patterns {
                score += re.find_iter(&chunk_lower).count() as f64 * params.proximity_weight;
            }
            score += (total - index) as f64 * params.position_weight;

            ChunkScore { index, score }
        })
        .collect()
}

/// Split a lowercased question into scoring words.
///
/// Words are whitespace-separated, stripped of surrounding punctuation,
/// and kept only if at least `min_len` characters long.
fn query_words(query_lower: &str, min_len: usize) -> Vec<String> {
    query_lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}

fn single(chunks: &[Chunk], params: &SelectionParams) -> Selection {
    let context = chunks
        .first()
        .map(|c| truncate_chars(&c.text, params.max_context_chars).to_string())
        .unwrap_or_default();
    Selection {
        strategy: Strategy::Single,
        chunk_indices: chunks.first().map(|c| vec![c.index]).unwrap_or_default(),
        context,
        top_scores: Vec::new(),
    }
}

fn leading(chunks: &[Chunk], count: usize, strategy: Strategy, params: &SelectionParams) -> Selection {
    let picked: Vec<&Chunk> = chunks.iter().take(count.min(chunks.len())).collect();
    assemble(&picked, strategy, Vec::new(), params)
}

fn keyword(question: &str, chunks: &[Chunk], params: &SelectionParams) -> Selection {
    let mut scored = score_chunks(question, chunks, params);
    // Stable: equal scores keep document order.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let top_scores: Vec<ChunkScore> = scored.iter().take(params.top_k).copied().collect();
    let best = top_scores.first().map(|s| s.score).unwrap_or(0.0);

    if best < params.min_score {
        let mut selection = leading(chunks, params.top_k, Strategy::Fallback, params);
        selection.top_scores = top_scores;
        return selection;
    }

    let mut indices: Vec<usize> = top_scores.iter().map(|s| s.index).collect();
    indices.sort_unstable();
    let picked: Vec<&Chunk> = indices.iter().map(|&i| &chunks[i]).collect();
    assemble(&picked, Strategy::Keyword, top_scores, params)
}

fn assemble(
    picked: &[&Chunk],
    strategy: Strategy,
    top_scores: Vec<ChunkScore>,
    params: &SelectionParams,
) -> Selection {
    let joined = picked
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTINUATION_MARKER);
    Selection {
        strategy,
        chunk_indices: picked.iter().map(|c| c.index).collect(),
        context: truncate_chars(&joined, params.max_context_chars).to_string(),
        top_scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| Chunk {
                index,
                text: t.to_string(),
            })
            .collect()
    }

    fn six_chunks() -> Vec<Chunk> {
        chunks(&[
            "Introduction to the course and grading policy.",
            "Cell biology covers membranes and organelles.",
            "Photosynthesis converts light energy into chemical energy in chloroplasts.",
            "Respiration releases energy from glucose in mitochondria.",
            "Genetics explains inheritance through genes and alleles.",
            "Ecology studies interactions between organisms and environment.",
        ])
    }

    #[test]
    fn classifies_locator_queries() {
        assert_eq!(
            classify_query("What is on page 3?"),
            QueryClass::Locator {
                section: SectionKind::Page,
                number: 3
            }
        );
        assert_eq!(
            classify_query("What happened in experiment no. 2?"),
            QueryClass::Locator {
                section: SectionKind::Experiment,
                number: 2
            }
        );
        assert_eq!(
            classify_query("explain Exp 7"),
            QueryClass::Locator {
                section: SectionKind::Experiment,
                number: 7
            }
        );
        assert_eq!(
            classify_query("summarize session number 12"),
            QueryClass::Locator {
                section: SectionKind::Session,
                number: 12
            }
        );
        assert_eq!(
            classify_query("lab exercise 4 steps"),
            QueryClass::Locator {
                section: SectionKind::Lab,
                number: 4
            }
        );
    }

    #[test]
    fn classifies_general_queries() {
        assert_eq!(classify_query("What is photosynthesis?"), QueryClass::General);
        assert_eq!(classify_query("explain the example 2"), QueryClass::General);
        assert_eq!(classify_query("see the homepage 3"), QueryClass::General);
    }

    #[test]
    fn single_chunk_is_returned_directly() {
        let params = SelectionParams {
            max_context_chars: 10,
            ..SelectionParams::default()
        };
        let sel = select_context("page 4", &chunks(&["A fairly long single chunk"]), &params);
        assert_eq!(sel.strategy, Strategy::Single);
        assert_eq!(sel.chunk_indices, [0]);
        assert_eq!(sel.context, "A fairly l");
    }

    #[test]
    fn locator_selects_leading_chunks_in_order() {
        let all = six_chunks();
        let sel = select_context("What happened in experiment 2?", &all, &SelectionParams::default());
        assert_eq!(sel.strategy, Strategy::Comprehensive);
        assert_eq!(sel.chunk_indices, [0, 1, 2, 3]);
        let expected = all[..4]
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTINUATION_MARKER);
        assert_eq!(sel.context, expected);
    }

    #[test]
    fn locator_ignores_scores() {
        let all = six_chunks();
        // "ecology" only matches the last chunk, but locator wins.
        let sel = select_context("ecology on page 6", &all, &SelectionParams::default());
        assert_eq!(sel.chunk_indices[0], 0);
    }

    #[test]
    fn locator_with_fewer_chunks_takes_all() {
        let sel = select_context(
            "page 2",
            &chunks(&["One.", "Two."]),
            &SelectionParams::default(),
        );
        assert_eq!(sel.chunk_indices, [0, 1]);
        assert_eq!(sel.context, format!("One.{}Two.", CONTINUATION_MARKER));
    }

    #[test]
    fn keyword_picks_relevant_chunks_in_document_order() {
        let all = six_chunks();
        let sel = select_context(
            "How does respiration release energy from glucose?",
            &all,
            &SelectionParams::default(),
        );
        assert_eq!(sel.strategy, Strategy::Keyword);
        assert!(sel.chunk_indices.contains(&3));
        assert_eq!(sel.chunk_indices.len(), 3);
        let mut sorted = sel.chunk_indices.clone();
        sorted.sort_unstable();
        assert_eq!(sel.chunk_indices, sorted);
        assert_eq!(sel.top_scores[0].index, 3);
    }

    #[test]
    fn exact_phrase_dominates() {
        let all = six_chunks();
        let scores = score_chunks(
            "genes and alleles",
            &all,
            &SelectionParams::default(),
        );
        let best = scores
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap();
        assert_eq!(best.index, 4);
        assert!(best.score >= 100.0);
    }

    #[test]
    fn scoring_counts_words_proximity_and_position() {
        let all = chunks(&["zzz", "energy light energy"]);
        let scores = score_chunks("light energy", &all, &SelectionParams::default());
        // chunk 0: position (2 - 0) * 0.5
        assert_eq!(scores[0].score, 1.0);
        // chunk 1: exact phrase 100 + "light" 5 + "energy" x2 10 + proximity 10 + position 0.5
        assert_eq!(scores[1].score, 125.5);
    }

    #[test]
    fn short_words_and_punctuation_are_ignored() {
        assert_eq!(
            query_words("what is an experiment? (really)", 3),
            ["what", "experiment", "really"]
        );
    }

    #[test]
    fn whole_word_matching_only() {
        let all = chunks(&["cellular cells", "the cell"]);
        let scores = score_chunks("cell", &all, &SelectionParams::default());
        // "cell" is a literal substring of chunk 0 (phrase bonus) but not a whole word.
        assert_eq!(scores[0].score, 100.0 + 1.0);
        assert_eq!(scores[1].score, 100.0 + 5.0 + 0.5);
    }

    #[test]
    fn no_overlap_falls_back_to_leading_chunks() {
        let all = six_chunks();
        let sel = select_context("Quantum chromodynamics?", &all, &SelectionParams::default());
        assert_eq!(sel.chunk_indices, [0, 1, 2]);
    }

    #[test]
    fn low_best_score_uses_fallback_strategy() {
        let all = chunks(&["alpha", "beta", "gamma", "delta"]);
        let sel = select_context("unrelated words", &all, &SelectionParams::default());
        assert_eq!(sel.strategy, Strategy::Fallback);
        assert_eq!(sel.chunk_indices, [0, 1, 2]);
        assert_eq!(sel.top_scores.len(), 3);
    }

    #[test]
    fn context_is_bounded() {
        let big = "word ".repeat(5_000);
        let all = chunks(&[&big, &big, &big, &big]);
        let params = SelectionParams {
            max_context_chars: 1_000,
            ..SelectionParams::default()
        };
        let sel = select_context("page 1", &all, &params);
        assert_eq!(sel.context.chars().count(), 1_000);
    }

    #[test]
    fn quiz_context_uses_leading_chunks() {
        let all = six_chunks();
        let sel = select_quiz_context(&all, &SelectionParams::default());
        assert_eq!(sel.strategy, Strategy::Comprehensive);
        assert_eq!(sel.chunk_indices, [0, 1, 2, 3]);

        let one = chunks(&["Only chunk."]);
        let sel = select_quiz_context(&one, &SelectionParams::default());
        assert_eq!(sel.strategy, Strategy::Single);
        assert_eq!(sel.context, "Only chunk.");
    }
}
