//! Overlap-aware text chunker for retrieval indexing
//!
//! Text is split into windows of at most `max_chars` characters. An interior
//! window end is pulled back to the last whitespace or sentence break within
//! the final [`LOOKBACK`] characters so words are not cut in half, and each
//! window after the first starts `overlap` characters before the previous end.
//!
//! All offsets are in characters, not bytes.

/// How far back from a proposed end the chunker looks for a break
pub const LOOKBACK: usize = 120;

/// Computes chunk boundaries as `[start, end)` character offsets
///
/// Spans are returned untrimmed: the first starts at 0, the last ends at the
/// text length, and each span starts at or before the previous span's end.
pub fn chunk_spans(text: &str, max_chars: usize, overlap: usize) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();

    if n == 0 {
        return Vec::new();
    }
    if max_chars == 0 {
        return vec![(0, n)];
    }

    let mut spans = Vec::new();
    let mut start = 0;
    let mut prev_end = 0;

    while start < n {
        let mut end = (start + max_chars).min(n);

        if end < n {
            // Never snap back inside the previous chunk, so ends strictly increase
            let window_start = start.max(end.saturating_sub(LOOKBACK)).max(prev_end);
            if let Some(pos) = last_break(&chars[window_start..end]) {
                end = window_start + pos + 1;
            }
        }

        spans.push((start, end));
        if end >= n {
            break;
        }
        prev_end = end;

        // An overlap as large as the chunk would never advance
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    spans
}

/// Splits text into trimmed, non-empty, overlapping chunks
///
/// # Arguments
///
/// * `text` - Text to split
/// * `max_chars` - Maximum characters per chunk; 0 returns the whole text as one chunk
/// * `overlap` - Characters shared between consecutive chunks
///
/// # Examples
///
/// ```
/// use gov_harvest::chunk_text;
///
/// assert!(chunk_text("", 100, 10).is_empty());
/// assert_eq!(chunk_text("whole text", 0, 0), vec!["whole text"]);
///
/// let chunks = chunk_text("alpha beta gamma delta", 12, 0);
/// assert_eq!(chunks, vec!["alpha beta", "gamma delta"]);
/// ```
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 {
        return vec![text.to_string()];
    }

    let byte_at = char_to_byte_offsets(text);

    chunk_spans(text, max_chars, overlap)
        .into_iter()
        .map(|(start, end)| text[byte_at[start]..byte_at[end]].trim())
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// Index of the rightmost newline, space, tab, or ". " within the window
fn last_break(window: &[char]) -> Option<usize> {
    window.iter().enumerate().rev().find_map(|(i, &c)| {
        let sentence_end = c == '.' && window.get(i + 1) == Some(&' ');
        (c == '\n' || c == ' ' || c == '\t' || sentence_end).then_some(i)
    })
}

/// Byte offset of every character boundary, including the end of the string
fn char_to_byte_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_text(len: usize) -> String {
        let words = [
            "census", "population", "dwelling", "region.", "income", "labour\n", "survey",
            "estimate", "quarterly", "release",
        ];
        let mut text = String::new();
        let mut i = 0;
        while text.chars().count() < len {
            text.push_str(words[i % words.len()]);
            text.push(' ');
            i += 1;
        }
        text.chars().take(len).collect()
    }

    #[test]
    fn test_degenerate_cases() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert_eq!(chunk_text("some text", 0, 0), vec!["some text"]);
        assert_eq!(chunk_text("short", 100, 10), vec!["short"]);
    }

    #[test]
    fn test_whitespace_only_text_yields_nothing() {
        assert!(chunk_text("   \n\t  ", 3, 1).is_empty());
    }

    #[test]
    fn test_ten_thousand_chars() {
        let text = sample_text(10_000);
        let chunks = chunk_text(&text, 1400, 200);

        assert!(chunks.len() >= 8);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(chunk.chars().count() <= 1400);
        }

        // Deterministic for fixed inputs
        assert_eq!(chunks, chunk_text(&text, 1400, 200));
    }

    #[test]
    fn test_snaps_to_word_boundary() {
        let text = "alpha beta gamma delta";
        let spans = chunk_spans(text, 12, 0);
        // "alpha beta g" would split a word; the end snaps after "beta "
        assert_eq!(spans[0], (0, 11));
        assert_eq!(chunk_text(text, 12, 0), vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn test_hard_cut_without_whitespace() {
        let text = "a".repeat(250);
        let chunks = chunk_text(&text, 100, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn test_overlap_equal_to_size_still_advances() {
        let text = "x".repeat(50);
        let spans = chunk_spans(&text, 10, 10);
        assert_eq!(spans.len(), 5);
        assert_eq!(spans.last(), Some(&(40, 50)));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "Ngā mihi nui ki a koutou katoa, tēnā koutou";
        let chunks = chunk_text(text, 10, 3);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
    }

    proptest! {
        #[test]
        fn prop_spans_cover_text_with_overlap(
            text in "[a-z .\n]{0,600}",
            max_chars in 1usize..200,
            overlap in 0usize..100,
        ) {
            let chars: Vec<char> = text.chars().collect();
            let spans = chunk_spans(&text, max_chars, overlap);

            if chars.is_empty() {
                prop_assert!(spans.is_empty());
            } else {
                prop_assert_eq!(spans[0].0, 0);
                prop_assert_eq!(spans[spans.len() - 1].1, chars.len());

                for &(start, end) in &spans {
                    prop_assert!(start < end);
                    prop_assert!(end - start <= max_chars);
                }

                for pair in spans.windows(2) {
                    let (prev, next) = (pair[0], pair[1]);
                    // No gap, and progress is strict
                    prop_assert!(next.0 <= prev.1);
                    prop_assert!(next.0 > prev.0);
                    prop_assert!(next.1 > prev.1);
                    // The shared region belongs to both chunks
                    let shared: String = chars[next.0..prev.1].iter().collect();
                    let prev_text: String = chars[prev.0..prev.1].iter().collect();
                    let next_text: String = chars[next.0..next.1].iter().collect();
                    prop_assert!(prev_text.ends_with(&shared));
                    prop_assert!(next_text.starts_with(&shared));
                }

                // Dropping each span's overlap with its predecessor rebuilds the text
                let mut rebuilt = String::new();
                let mut covered = 0;
                for &(start, end) in &spans {
                    let from = start.max(covered);
                    rebuilt.extend(&chars[from..end]);
                    covered = end;
                }
                prop_assert_eq!(rebuilt, text.clone());
            }

            for chunk in chunk_text(&text, max_chars, overlap) {
                prop_assert!(!chunk.is_empty());
                prop_assert!(chunk.chars().count() <= max_chars);
            }
        }
    }
}
