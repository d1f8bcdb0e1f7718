//! Reversible id escaping for path tokens.
//!
//! Ids may contain any character. The path grammar reserves `;`, `/` and
//! `,`, and `\` is reserved for compatibility with backslash-escaping
//! writers, so those are percent-encoded along with `%` itself.

/// Percent-encode the characters reserved by the path grammar.
pub fn escape_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ';' => out.push_str("%3B"),
            '/' => out.push_str("%2F"),
            ',' => out.push_str("%2C"),
            '\\' => out.push_str("%5C"),
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`escape_id`].
///
/// Only the five reserved sequences are decoded (hex digits in either
/// case); any other `%` is kept literally, so this never fails.
pub fn unescape_id(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match tail.get(1..3).and_then(decode_reserved) {
            Some(ch) => {
                out.push(ch);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reserved(hex: &str) -> Option<char> {
    match hex.to_ascii_uppercase().as_str() {
        "25" => Some('%'),
        "3B" => Some(';'),
        "2F" => Some('/'),
        "2C" => Some(','),
        "5C" => Some('\\'),
        _ => None,
    }
}
