//! Chunking: split long text into bounded, contiguous segments.
//!
//! Slicing is purely positional. Boundaries may fall mid-sentence; the
//! reduce step (and plain concatenation for translations) tolerates that.
//! Lengths are counted in Unicode scalar values, so a chunk never splits a
//! multi-byte character and "length" means the same thing here as in the
//! output formatter.

/// Split `text` into consecutive chunks of at most `max_chunk_chars` characters.
///
/// * concatenating the chunks reproduces `text` exactly
/// * the chunk count is `ceil(chars(text) / max_chunk_chars)`; empty input
///   yields no chunks
/// * every chunk but the last has exactly `max_chunk_chars` characters
///
/// A `max_chunk_chars` of zero is treated as one.
pub fn split(text: &str, max_chunk_chars: usize) -> Vec<&str> {
    let max = max_chunk_chars.max(1);
    let mut chunks = Vec::with_capacity(text.len() / max + 1);
    let mut start = 0;
    let mut count = 0;

    for (byte_idx, _) in text.char_indices() {
        if count == max {
            chunks.push(&text[start..byte_idx]);
            start = byte_idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Return the first `max_chars` characters of `text` (char-boundary safe).
pub fn prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split("", 10).is_empty());
    }

    #[test]
    fn short_text_yields_one_chunk() {
        assert_eq!(split("hello", 3000), vec!["hello"]);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_chunk() {
        let chunks = split("abcdef", 3);
        assert_eq!(chunks, vec!["abc", "def"]);
    }

    #[test]
    fn seven_thousand_chars_in_three_thousand_chunks() {
        let text = "x".repeat(7000);
        let lens: Vec<usize> = split(&text, 3000).iter().map(|c| char_len(c)).collect();
        assert_eq!(lens, vec![3000, 3000, 1000]);
    }

    #[test]
    fn concatenation_is_lossless_for_many_sizes() {
        let text = "Lorem ipsum dolor sit amet, ñandú über straße — Привет мир! 日本語のテキスト。\n\n"
            .repeat(13);
        let n = char_len(&text);
        for m in 1..=97 {
            let chunks = split(&text, m);
            assert_eq!(chunks.concat(), text, "m={m}");
            assert_eq!(chunks.len(), n.div_ceil(m), "m={m}");
            assert!(chunks.iter().all(|c| char_len(c) <= m), "m={m}");
        }
    }

    #[test]
    fn multibyte_chars_are_never_split() {
        let text = "ééééé";
        let chunks = split(text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn zero_size_is_treated_as_one() {
        assert_eq!(split("abc", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn prefix_respects_char_boundaries() {
        assert_eq!(prefix("привет", 3), "при");
        assert_eq!(prefix("abc", 10), "abc");
        assert_eq!(prefix("abc", 0), "");
    }
}
