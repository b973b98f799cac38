//! Split long text into bounded pieces, cutting at line boundaries when possible.
//!
//! Lengths are counted in chars. A newline at a cut stays at the start of the next
//! chunk, so concatenating the chunks always gives back the input.

/// Split `text` into chunks of at most `max_len` chars.
///
/// The cut is placed at the rightmost newline in positions `1..=max_len` of the
/// remaining text; without one, the text is cut hard at `max_len`. A `max_len`
/// of 0 is treated as 1. Empty input yields a single empty chunk.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    loop {
        // byte offsets: char index max_len, and the last newline after index 0
        let mut cut_at_max = None;
        let mut last_newline = None;
        for (i, (offset, ch)) in rest.char_indices().enumerate() {
            if i == max_len {
                cut_at_max = Some(offset);
                break;
            }
            if ch == '\n' && i > 0 {
                last_newline = Some(offset);
            }
        }
        // newline exactly at position max_len is still inside the window
        if let Some(offset) = cut_at_max {
            if rest[offset..].starts_with('\n') {
                last_newline = Some(offset);
            }
        }

        let Some(hard_cut) = cut_at_max else {
            chunks.push(rest.to_string());
            break;
        };
        let split = last_newline.unwrap_or(hard_cut);
        let (head, tail) = rest.split_at(split);
        chunks.push(head.to_string());
        rest = tail;
        if rest.is_empty() {
            break;
        }
    }

    chunks
}
