//! Split document text into overlapping, bounded-size chunks.
//!
//! Sizes are counted in characters, and every slice lands on a UTF-8
//! character boundary.

/// Chunk text with overlap
///
/// Each chunk holds at most `max_size` characters. Cuts prefer a paragraph
/// break, then a sentence end, then whitespace, and fall back to a hard cut.
/// Consecutive chunks share up to `overlap` characters, starting at a word
/// boundary where one exists. Chunks are trimmed; empty text yields no chunks.
pub fn chunk_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() || max_size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        // Leading whitespace would count against the window
        start += text[start..].len() - text[start..].trim_start().len();
        if start >= text.len() {
            break;
        }

        let hard_end = advance_chars(text, start, max_size);
        let end = if hard_end >= text.len() {
            text.len()
        } else {
            find_break(text, start, hard_end)
        };

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= text.len() {
            break;
        }

        let mut next = snap_to_word_start(text, retreat_chars(text, end, overlap), end);
        // Always make progress, even when the overlap covers the whole chunk
        if next <= start {
            next = end;
        }
        start = next;
    }

    chunks
}

/// Byte offset `n` characters after `from`, capped at the end of `text`
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(offset, _)| from + offset)
        .unwrap_or(text.len())
}

/// Byte offset `n` characters before `from`, floored at 0
fn retreat_chars(text: &str, from: usize, n: usize) -> usize {
    if n == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map(|(offset, _)| offset)
        .unwrap_or(from)
}

/// Pick the cut point inside `text[start..hard_end]`.
///
/// The character just past the window is consulted, so a word or sentence
/// ending exactly at `hard_end` still counts as a clean break. Boundaries
/// in the second half of the window are preferred, so a stray early break
/// cannot produce a tiny chunk; an early word break still beats cutting a
/// word in two.
fn find_break(text: &str, start: usize, hard_end: usize) -> usize {
    let window = &text[start..hard_end];
    let min = window.len() / 2;
    let next = text[hard_end..].chars().next();

    let paragraph = if text[hard_end..].starts_with("\n\n") {
        Some(window.len())
    } else {
        window.rfind("\n\n")
    };
    if let Some(pos) = paragraph {
        if pos > min {
            return start + pos;
        }
    }

    let followed_by_space = |i: usize, c: char| {
        window[i + c.len_utf8()..]
            .chars()
            .next()
            .or(next)
            .map_or(false, char::is_whitespace)
    };
    let sentence_end = window
        .char_indices()
        .filter(|&(i, c)| matches!(c, '.' | '!' | '?') && followed_by_space(i, c))
        .map(|(i, c)| i + c.len_utf8())
        .last();
    if let Some(pos) = sentence_end {
        if pos > min {
            return start + pos;
        }
    }

    let whitespace = if next.map_or(false, char::is_whitespace) {
        Some(window.len())
    } else {
        window
            .char_indices()
            .filter(|(_, c)| c.is_whitespace())
            .map(|(i, _)| i)
            .last()
    };
    match whitespace {
        Some(pos) if pos > 0 => start + pos,
        _ => hard_end,
    }
}

/// Move an overlap start forward past a partial word, staying before `end`.
///
/// When the overlap lies inside the chunk's last word there is no word start
/// to move to, so the overlap is dropped and the next chunk begins at `end`.
fn snap_to_word_start(text: &str, pos: usize, end: usize) -> usize {
    if pos >= end {
        return pos;
    }
    let mid_word = text[..pos]
        .chars()
        .next_back()
        .map_or(false, |c| !c.is_whitespace());
    if !mid_word {
        return pos;
    }

    match text[pos..end].char_indices().find(|(_, c)| c.is_whitespace()) {
        Some((offset, c)) => pos + offset + c.len_utf8(),
        None => end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    /// Longest suffix of `a` that is also a prefix of `b`, in characters.
    fn shared_chars(a: &str, b: &str) -> usize {
        b.char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .filter(|&end| a.ends_with(&b[..end]))
            .map(|end| b[..end].chars().count())
            .last()
            .unwrap_or(0)
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("", 300, 50).is_empty());
        assert!(chunk_text("   \n\n\t ", 300, 50).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("  Attention is all you need.  ", 300, 50);
        assert_eq!(chunks, vec!["Attention is all you need.".to_string()]);
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let text = numbered_words(500);
        let chunks = chunk_text(&text, 120, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_multibyte_text_is_safe() {
        let text = "é日本語 ".repeat(200);
        let chunks = chunk_text(&text, 37, 9);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 37);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let first = "Sentence one is here. Sentence two is here too.";
        let second = "The second paragraph talks about something else entirely.";
        let text = format!("{}\n\n{}", first, second);
        let chunks = chunk_text(&text, 80, 0);
        assert_eq!(chunks[0], first);
        assert_eq!(chunks[1], second);
    }

    #[test]
    fn test_prefers_sentence_end_over_whitespace() {
        let text = "Transformers use attention heavily. They scale well with data and compute";
        let chunks = chunk_text(text, 60, 0);
        assert_eq!(chunks[0], "Transformers use attention heavily.");
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "a".repeat(250);
        let chunks = chunk_text(&text, 100, 0);
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![100, 100, 50]);
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        let text = numbered_words(200);
        let chunks = chunk_text(&text, 100, 20);
        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let shared = shared_chars(&pair[0], &pair[1]);
            assert!(shared > 0, "no overlap between {:?} and {:?}", pair[0], pair[1]);
            assert!(shared <= 20);
        }
    }

    #[test]
    fn test_overlap_inside_last_word_does_not_split_it() {
        let text = "alpha beta gamma delta epsilon zeta";
        let words: Vec<&str> = text.split_whitespace().collect();
        let chunks = chunk_text(text, 12, 4);
        assert_eq!(chunks, vec!["alpha beta", "beta gamma", "delta", "epsilon zeta"]);

        for chunk in &chunks {
            for word in chunk.split_whitespace() {
                assert!(words.contains(&word), "fragment {:?} in chunk {:?}", word, chunk);
            }
        }
        for word in &words {
            assert!(
                chunks.iter().any(|c| c.split_whitespace().any(|w| w == *word)),
                "{:?} never appears whole",
                word
            );
        }
    }

    #[test]
    fn test_overlap_never_starts_mid_word() {
        let text = "Attention heads (e.g. multi-head) matter. Done";
        let words: Vec<&str> = text.split_whitespace().collect();
        for (size, overlap) in [(13, 3), (12, 5), (20, 7), (16, 2)] {
            for chunk in chunk_text(text, size, overlap) {
                let first = chunk.split_whitespace().next().unwrap();
                assert!(
                    words.iter().any(|w| w.starts_with(first)),
                    "size {} overlap {}: chunk {:?} starts mid-word",
                    size,
                    overlap,
                    chunk
                );
            }
        }
    }

    #[test]
    fn test_word_filling_whole_window_stays_intact() {
        let text = "mechanisms (e.g. multi-head) matter greatly";
        for overlap in [0, 3] {
            let chunks = chunk_text(text, 11, overlap);
            assert_eq!(
                chunks,
                vec!["mechanisms", "(e.g.", "multi-head)", "matter", "greatly"]
            );
        }
    }

    #[test]
    fn test_no_overlap_covers_all_words() {
        let text = numbered_words(300);
        let chunks = chunk_text(&text, 64, 0);
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_still_terminates() {
        let text = numbered_words(100);
        let chunks = chunk_text(&text, 10, 10);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < text.len());
    }

    #[test]
    fn test_deterministic() {
        let text = numbered_words(400);
        assert_eq!(chunk_text(&text, 90, 15), chunk_text(&text, 90, 15));
    }
}
