//! Output shaping: polish raw LLM text and fit it into a transport message.
//!
//! Two separate concerns live here:
//!
//! * [`polish`] applies cheap, deterministic cleanups to every completion
//!   result. Even well-prompted models occasionally wrap their answer in a
//!   ` ```markdown ` fence, emit CRLF line endings or invisible Unicode. Fixing
//!   that here keeps the prompts focused on *what* to produce.
//!
//! * [`format`] enforces the transport's message-size limit. It is a plain
//!   character cut with a visible marker: lossy, but the user is told.

use once_cell::sync::Lazy;
use regex::Regex;

/// Appended to truncated messages. Exactly ten characters, so a message cut
/// to `limit - 10` characters plus the marker is exactly `limit` long.
pub const TRUNCATION_MARKER: &str = "\n[cortado]";

/// Fit `text` into `limit` characters.
///
/// Returns `text` unchanged when it fits. Otherwise keeps the first
/// `limit - 10` characters and appends [`TRUNCATION_MARKER`]. Limits too small
/// for the marker degrade to a bare cut at `limit` characters.
pub fn format(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if limit <= marker_len {
        return text.chars().take(limit).collect();
    }
    let mut out: String = text.chars().take(limit - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Apply all cleanup rules to a raw completion result.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences (models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim leading/trailing blank space of the whole text
pub fn polish(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

/// Normalise extracted document text: line endings and invisible characters.
///
/// Unlike [`polish`], this keeps all other whitespace untouched, so chunk
/// boundaries computed later still refer to the text the user uploaded.
pub fn normalise_extracted(input: &str) -> String {
    remove_invisible_chars(&normalise_line_endings(input))
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text)?\n(.*)\n```\s*$").expect("valid fence regex")
});

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{4,}").expect("valid blank-line regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_ten_chars() {
        assert_eq!(TRUNCATION_MARKER.chars().count(), 10);
    }

    #[test]
    fn short_text_unchanged() {
        assert_eq!(format("hola", 4000), "hola");
        let exact = "a".repeat(4000);
        assert_eq!(format(&exact, 4000), exact);
    }

    #[test]
    fn long_text_truncated_to_limit() {
        let text = "b".repeat(5000);
        let out = format(&text, 4000);
        assert_eq!(out.chars().count(), 4000);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(out.trim_end_matches(TRUNCATION_MARKER).chars().count(), 3990);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "ж".repeat(50);
        let out = format(&text, 20);
        assert_eq!(out.chars().count(), 20);
        assert!(out.starts_with(&"ж".repeat(10)));
    }

    #[test]
    fn tiny_limit_degrades_to_bare_cut() {
        assert_eq!(format("abcdefghijkl", 4), "abcd");
    }

    #[test]
    fn test_strip_fences() {
        let input = "```markdown\n# Hello\nWorld\n```";
        assert_eq!(strip_markdown_fences(input), "# Hello\nWorld");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_markdown_fences("# Hello\nWorld"), "# Hello\nWorld");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn polish_full_pipeline() {
        let input = "```\n• punto uno   \r\n\r\n\r\n\r\n\r\n• punto\u{200B} dos\n```";
        assert_eq!(polish(input), "• punto uno\n\n\n• punto dos");
    }

    #[test]
    fn normalise_extracted_keeps_spacing() {
        assert_eq!(normalise_extracted("a  \r\nb\u{FEFF}"), "a  \nb");
    }
}
