//! Sentence-boundary text chunker.
//!
//! Splits normalized document text into [`Chunk`]s of at most
//! `max_chunk_size` characters without breaking sentences.
//!
//! # Algorithm
//!
//! 1. If the text already fits in `max_chunk_size`, return it as one chunk.
//! 2. Split the text into sentence units. A unit ends after a run of
//!    terminal punctuation (`.`, `!`, `?`); trailing text without terminal
//!    punctuation forms a final unit. Text with no boundary at all is a
//!    single unit.
//! 3. Accumulate units into a buffer. When appending the next unit would
//!    exceed `max_chunk_size`, flush the trimmed buffer as a chunk and
//!    start a new buffer with that unit.
//! 4. Flush the final non-empty buffer.
//!
//! A single sentence longer than `max_chunk_size` is never split; it
//! becomes its own oversized chunk.
//!
//! # Example
//!
//! ```rust
//! use study_harness_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("A. B. C. D.", 6);
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["A. B.", "C. D."]);
//! ```

use crate::models::Chunk;

/// Default maximum chunk size in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 18_000;

/// Split text into sentence-respecting chunks of at most `max_chunk_size`
/// characters.
///
/// # Guarantees
///
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - No chunk is empty; blank input yields no chunks.
/// - Every chunk is trimmed and at most `max_chunk_size` characters, unless
///   it consists of one sentence that alone exceeds the limit.
/// - Re-chunking any produced chunk with the same limit yields that chunk
///   unchanged.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<Chunk> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.chars().count() <= max_chunk_size {
        return vec![Chunk {
            index: 0,
            text: trimmed.to_string(),
        }];
    }

    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for sentence in split_sentences(text) {
        let sentence_chars = sentence.chars().count();
        if buf_chars + sentence_chars > max_chunk_size {
            push_chunk(&mut chunks, &buf);
            buf.clear();
            buf_chars = 0;
        }
        buf.push_str(sentence);
        buf_chars += sentence_chars;
    }
    push_chunk(&mut chunks, &buf);

    chunks
}

/// Split text into sentence units, keeping every character.
///
/// Each unit carries its leading whitespace and ends with its run of
/// terminal punctuation, so concatenating the units reproduces `text`.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0usize;
    let mut in_terminal_run = false;

    for (i, c) in text.char_indices() {
        let terminal = is_terminal(c);
        if in_terminal_run && !terminal {
            units.push(&text[start..i]);
            start = i;
        }
        in_terminal_run = terminal;
    }
    if start < text.len() {
        units.push(&text[start..]);
    }

    units
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn push_chunk(chunks: &mut Vec<Chunk>, buf: &str) {
    let text = buf.trim();
    if text.is_empty() {
        return;
    }
    chunks.push(Chunk {
        index: chunks.len(),
        text: text.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("  Hello, world!  ", DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("   ", 100).is_empty());
    }

    #[test]
    fn test_greedy_sentence_packing() {
        let chunks = chunk_text("A. B. C. D.", 6);
        assert_eq!(texts(&chunks), ["A. B.", "C. D."]);
    }

    #[test]
    fn test_flush_before_overflowing_sentence() {
        // " C." would push the buffer to 8 chars, so it opens the next chunk.
        let chunks = chunk_text("A. B. C. D.", 5);
        assert_eq!(texts(&chunks), ["A. B.", "C.", "D."]);
    }

    #[test]
    fn test_no_mid_sentence_split_at_default_size() {
        let sentence = "The mitochondria is the powerhouse of the cell. ";
        let text = sentence.repeat(1_000);
        let chunks = chunk_text(&text, DEFAULT_MAX_CHUNK_SIZE);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= DEFAULT_MAX_CHUNK_SIZE);
            assert!(c.text.starts_with("The mitochondria"));
            assert!(c.text.ends_with("cell."));
        }
    }

    #[test]
    fn test_concatenation_reproduces_text() {
        let text = (0..400)
            .map(|i| format!("Sentence number {} is here! Is it? Yes.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 500);
        let joined = texts(&chunks).join(" ");
        assert_eq!(joined, text);
        assert_eq!(squash(&joined), squash(&text));
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = "Short sentence. ".repeat(200);
        let chunks = chunk_text(&text, 100);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_oversized_sentence_is_its_own_chunk() {
        let long = format!("{}.", "x".repeat(50));
        let text = format!("Intro. {} Outro.", long);
        let chunks = chunk_text(&text, 20);
        assert_eq!(texts(&chunks), ["Intro.", long.as_str(), "Outro."]);
    }

    #[test]
    fn test_no_boundary_is_single_unit() {
        let text = "no punctuation anywhere in this text at all";
        let chunks = chunk_text(text, 10);
        assert_eq!(texts(&chunks), [text]);
    }

    #[test]
    fn test_trailing_fragment_is_kept() {
        let chunks = chunk_text("First one. Second one. trailing words", 12);
        assert_eq!(
            texts(&chunks),
            ["First one.", "Second one.", "trailing words"]
        );
    }

    #[test]
    fn test_rechunking_is_idempotent() {
        let text = (0..300)
            .map(|i| format!("Line {} ends here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        for max in [40, 100, 333] {
            for c in chunk_text(&text, max) {
                let again = chunk_text(&c.text, max);
                assert_eq!(texts(&again), [c.text.as_str()]);
            }
        }
    }

    #[test]
    fn test_multibyte_lengths_counted_in_chars() {
        let text = "Ünïcödé wörds. ".repeat(20);
        let chunks = chunk_text(&text, 30);
        for c in &chunks {
            assert!(c.text.chars().count() <= 30);
        }
    }

    #[test]
    fn test_split_sentences_keeps_everything() {
        let text = "Wait... what?! Fine. tail";
        let units = split_sentences(text);
        assert_eq!(units, ["Wait...", " what?!", " Fine.", " tail"]);
        assert_eq!(units.concat(), text);
    }
}
