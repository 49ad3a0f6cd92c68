//! Text preparation for synthesis: sentence splitting and chunking.
//!
//! The model is called once per chunk, so long request bodies are cut at
//! sentence boundaries first, then at word boundaries, and only as a last
//! resort inside a word.

/// Default maximum chunk length (bytes) for [`chunk_text`].
pub const DEFAULT_MAX_CHUNK_LEN: usize = 400;

/// Rejection message for a request with nothing to speak.
pub const NO_TEXT_PROVIDED: &str = "No text provided";

/// True when `text` has nothing to speak.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// First `max_chars` characters of `text`, with `...` when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace, and at
/// paragraph breaks (two or more newlines).
///
/// Returns trimmed, non-empty strings.
pub fn split_sentences(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        let end = match bytes[i] {
            b'\n' if next == Some(b'\n') => Some(i),
            b'.' | b'!' | b'?' if next.is_some_and(|n| n.is_ascii_whitespace()) => Some(i + 1),
            _ => None,
        };

        let Some(end) = end else {
            i += 1;
            continue;
        };

        push_trimmed(&mut sentences, &text[start..end]);
        i = end;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        start = i;
    }

    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

/// Group sentences into chunks of at most `max_len` bytes.
///
/// Sentences longer than `max_len` are split at word boundaries; words longer
/// than `max_len` are hard-split at char boundaries. A single char wider than
/// `max_len` still forms its own chunk.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let sentences = split_sentences(text);
    pack(sentences.iter().map(String::as_str), max_len, split_words)
}

fn split_words(sentence: &str, max_len: usize) -> Vec<String> {
    pack(sentence.split_whitespace(), max_len, hard_split)
}

fn hard_split(word: &str, max_len: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > max_len {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Greedily join `parts` with single spaces while staying under `max_len`.
fn pack<'a>(
    parts: impl Iterator<Item = &'a str>,
    max_len: usize,
    split_oversized: fn(&str, usize) -> Vec<String>,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for part in parts {
        if part.len() > max_len {
            flush(&mut chunks, &mut current);
            chunks.extend(split_oversized(part, max_len));
            continue;
        }
        if !current.is_empty() && current.len() + 1 + part.len() > max_len {
            flush(&mut chunks, &mut current);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(part);
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}
