/// Lexical context of the byte currently being scanned.
#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

pub(super) fn starts_with_pair(bytes: &[u8], idx: usize, pair: [u8; 2]) -> bool {
    bytes.get(idx) == Some(&pair[0]) && bytes.get(idx + 1) == Some(&pair[1])
}

/// End index (exclusive) of the run of ASCII digits starting at `start`, if non-empty.
pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<usize> {
    let end = bytes[start.min(bytes.len())..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count()
        + start;
    (end > start).then_some(end)
}

/// `$tag$` opener at `start`: returns the tag and the index of the closing `$`.
pub(super) fn dollar_quote_tag(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let body = bytes.get(start + 1..)?;
    let len = body
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    if body.get(len) != Some(&b'$') {
        return None;
    }
    let tag = String::from_utf8(body[..len].to_vec()).ok()?;
    Some((tag, start + 1 + len))
}

/// Whether `$tag$` closes at `idx`.
pub(super) fn closes_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    bytes.get(idx + 1..end) == Some(tag.as_bytes()) && bytes.get(end) == Some(&b'$')
}
