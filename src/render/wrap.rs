//! Greedy word wrapper.
//!
//! Words are never broken: a word longer than the available width goes on
//! a line of its own.

/// Split `text` into alternating runs of whitespace and non-whitespace.
fn chunks(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut space = None;
    for (at, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        if space.is_some_and(|s| s != is_space) {
            out.push(&text[start..at]);
            start = at;
        }
        space = Some(is_space);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn columns(text: &str) -> usize {
    text.chars().count()
}

/// Wrap `text` into lines of at most `width` columns, prefix included.
///
/// The first line starts with `initial` and keeps the text's leading
/// whitespace; later lines start with `subsequent`. Trailing whitespace is
/// dropped. A `width` of 0 disables wrapping. At least one line is always
/// returned, so blank text yields the trimmed prefix.
pub fn wrap(text: &str, width: usize, initial: &str, subsequent: &str) -> Vec<String> {
    if width == 0 {
        return vec![format!("{}{}", initial, text).trim_end().to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = initial.to_string();
    let mut empty = true;
    let mut space = String::new();
    for chunk in chunks(text) {
        if chunk.starts_with(char::is_whitespace) {
            space.push_str(chunk);
            continue;
        }
        if !empty && columns(&current) + columns(&space) + columns(chunk) > width {
            lines.push(current.trim_end().to_string());
            current = subsequent.to_string();
            space.clear();
        }
        current.push_str(&space);
        current.push_str(chunk);
        space.clear();
        empty = false;
    }
    if !empty || lines.is_empty() {
        lines.push(current.trim_end().to_string());
    }
    lines
}
