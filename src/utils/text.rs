/// First `max_chars` characters of `s`, cut on a char boundary.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Split `s` into consecutive slices of at most `size` characters.
/// A `size` of zero yields the whole string as one slice.
pub fn char_chunks(s: &str, size: usize) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let split = if size == 0 {
            rest.len()
        } else {
            rest.char_indices().nth(size).map_or(rest.len(), |(idx, _)| idx)
        };
        let (head, tail) = rest.split_at(split);
        rest = tail;
        Some(head)
    })
}
