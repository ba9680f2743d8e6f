//! URL-fragment anchors for deep links to a single entry.

use percent_encoding::percent_decode_str;

pub const ANCHOR_PREFIX: &str = "faq-";

/// Lowercases `value`, joins whitespace runs with `-` and drops everything
/// outside `[a-z0-9-]`.
pub fn slug(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '-')
        .collect()
}

/// The `faq-<slug>` anchor for an entry identifier. Empty identifiers have no anchor.
pub fn anchor_id(identifier: &str) -> String {
    if identifier.is_empty() {
        return String::new();
    }
    format!("{ANCHOR_PREFIX}{}", slug(identifier))
}

/// Drops one leading `#`.
pub fn sanitize_fragment(fragment: &str) -> &str {
    fragment.strip_prefix('#').unwrap_or(fragment)
}

/// Percent-decodes a raw URL fragment.
///
/// A malformed escape sequence or a decoding that is not UTF-8 yields the raw
/// fragment unchanged.
pub fn decode_fragment(raw: &str) -> String {
    if !escapes_are_well_formed(raw) {
        return raw.to_string();
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn escapes_are_well_formed(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let valid = bytes
                .get(idx + 1..idx + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            idx += 3;
        } else {
            idx += 1;
        }
    }
    true
}
