use once_cell::sync::Lazy;
use regex::Regex;

// Shape of an explicit regex literal, e.g. /foo.*bar/i
static REGEX_LITERAL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(.+)/([a-zA-Z]*)$").expect("literal shape pattern is valid"));

/// Recognizes a `/pattern/flags` literal and rewrites it into a plain
/// pattern string with inline flags. Case-insensitivity is appended unless
/// the caller asked for case-sensitive matching or the literal carries the
/// `i` flag itself. Returns `None` when `term` is not a regex literal.
///
/// The produced pattern may still fail to compile; callers decide whether
/// that is an error or a non-match.
pub(crate) fn parse_regex_literal(term: &str, case_sensitive: bool) -> Option<String> {
    let captures = REGEX_LITERAL_SHAPE.captures(term)?;
    let body = captures.get(1).map_or("", |m| m.as_str());
    let flags = captures.get(2).map_or("", |m| m.as_str());

    let mut inline = String::new();
    if flags.contains('i') || !case_sensitive {
        inline.push('i');
    }
    if flags.contains('m') {
        inline.push('m');
    }
    if flags.contains('s') {
        inline.push('s');
    }

    if inline.is_empty() {
        Some(body.to_string())
    } else {
        Some(format!("(?{}){}", inline, body))
    }
}

/// Collects match start offsets for a compiled pattern, in strictly
/// increasing order. A zero-width match advances the scan cursor past one
/// character so the loop always makes progress.
pub(crate) fn regex_positions(regex: &Regex, content: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut at = 0;
    while at <= content.len() {
        let Some(m) = regex.find_at(content, at) else {
            break;
        };
        positions.push(m.start());
        if m.end() > m.start() {
            at = m.end();
        } else {
            match content[m.end()..].chars().next() {
                Some(c) => at = m.end() + c.len_utf8(),
                None => break,
            }
        }
    }
    positions
}
