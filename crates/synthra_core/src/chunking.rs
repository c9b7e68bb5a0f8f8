const SENTENCE_ENDINGS: [char; 6] = ['.', '?', '!', '。', '？', '！'];

/// Length in characters, which is what every budget here is measured in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Character budget for a single inference call:
/// `floor(context_window_tokens * safety_margin) * chars_per_token`.
pub fn char_budget(context_window_tokens: u32, safety_margin: f32, chars_per_token: u32) -> usize {
    let margin = f64::from(safety_margin.clamp(0.0, 1.0));
    let usable_tokens = (f64::from(context_window_tokens) * margin).floor() as usize;
    usable_tokens.saturating_mul(chars_per_token as usize)
}

/// Splits `text` into ordered, non-empty slices of at most `max_chars`
/// characters each.
///
/// A chunk ends just after the last sentence terminator inside its window;
/// without one the window is cut at the limit. The chunks concatenate back to
/// `text` exactly.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some((limit, _)) = rest.char_indices().nth(max_chars) else {
            chunks.push(rest);
            break;
        };
        // Never walk back past the window start: an empty chunk would loop forever.
        let end = rest[..limit]
            .char_indices()
            .rev()
            .find(|(_, c)| SENTENCE_ENDINGS.contains(c))
            .map(|(idx, c)| idx + c.len_utf8())
            .unwrap_or(limit);
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}
