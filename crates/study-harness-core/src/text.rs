//! Text normalization and post-processing helpers.
//!
//! All length arithmetic in this crate is in characters (Unicode scalar
//! values), never bytes, so truncation can't split a multi-byte character.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n?(.*?)```").expect("valid regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));
static STAR_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\s*)\*\s+").expect("valid regex"));
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+").expect("valid regex"));
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#+\s+").expect("valid regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));
static UNDERSCORE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").expect("valid regex"));

/// Collapse whitespace runs to a single space, drop control characters,
/// and trim both ends.
///
/// Control characters are the C0 and C1 ranges (`U+0000..=U+001F`,
/// `U+007F..=U+009F`). Whitespace controls such as `\n` and `\t` count as
/// whitespace and become a single space; every other control is removed
/// without affecting the surrounding spacing.
pub fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if c.is_control() {
            continue;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    out
}

/// Return the longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Remove markdown code-fence lines (```` ``` ```` and ```` ```json ````)
/// while keeping the fenced content.
pub fn strip_code_fences(s: &str) -> String {
    s.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Strip markdown decoration from a generated answer so it reads as plain
/// prose.
///
/// Code inside fences or backticks is kept; only the markers go. Star
/// bullets become hyphen bullets, and emphasis stars, heading hashes, link
/// targets, and underscore runs are removed.
pub fn clean_answer_markdown(answer: &str) -> String {
    let out = FENCED_BLOCK.replace_all(answer, |caps: &regex::Captures| {
        caps.get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    });
    let out = INLINE_CODE.replace_all(&out, "$1");
    let out = STAR_BULLET.replace_all(&out, "$1- ");
    let out = EMPHASIS.replace_all(&out, "");
    let out = HEADING.replace_all(&out, "");
    let out = LINK.replace_all(&out, "$1");
    let out = UNDERSCORE_RUN.replace_all(&out, "");
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("a \n\n b\t\tc"), "a b c");
    }

    #[test]
    fn normalize_drops_controls_without_double_spaces() {
        assert_eq!(normalize_text("a \u{0001} b\u{009F}c\u{007F}"), "a bc");
    }

    #[test]
    fn normalize_trims() {
        assert_eq!(normalize_text("\n  padded  \r\n"), "padded");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn strip_fences_keeps_body() {
        let raw = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(strip_code_fences(raw), "[{\"a\": 1}]");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn clean_answer_removes_emphasis_and_headings() {
        let raw = "## Overview\nThis is **important** and *subtle*.";
        assert_eq!(
            clean_answer_markdown(raw),
            "Overview\nThis is important and subtle."
        );
    }

    #[test]
    fn clean_answer_keeps_code_text() {
        let raw = "Call `parse()` first.\n```rust\nfn main() {}\n```";
        assert_eq!(clean_answer_markdown(raw), "Call parse() first.\nfn main() {}");
    }

    #[test]
    fn clean_answer_unwraps_links_and_bullets() {
        let raw = "* see [the docs](https://example.com)\n* __note__";
        assert_eq!(clean_answer_markdown(raw), "- see the docs\n- note");
    }
}
