use crate::data::{DetailSection, FaqEntry};
use crate::plain::to_plain_text;

/// Trims and lower-cases a raw query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Lower-cased plain text of everything searchable in an entry, chunks joined
/// by a single space.
pub fn haystack(entry: &FaqEntry) -> String {
    let mut chunks = vec![
        to_plain_text(&entry.title),
        to_plain_text(&entry.short_answer),
    ];
    for section in &entry.detail_section {
        match section {
            DetailSection::Text { text } => chunks.push(to_plain_text(text)),
            DetailSection::RuleReference { rules } => {
                for rule in rules {
                    chunks.push(rule.number.clone());
                    chunks.push(to_plain_text(&rule.text));
                }
            }
            DetailSection::CardImage { cards } => {
                for card in cards {
                    chunks.push(to_plain_text(&card.text));
                    if let Some(errata) = card.errata.as_deref().filter(|e| !e.is_empty()) {
                        chunks.push(to_plain_text(errata));
                    }
                }
            }
            DetailSection::Unknown => {}
        }
    }
    chunks.retain(|chunk| !chunk.is_empty());
    chunks.join(" ").to_lowercase()
}

/// Substring test of an already-normalized query against a haystack.
pub fn haystack_matches(haystack: &str, normalized_query: &str) -> bool {
    normalized_query.is_empty() || haystack.contains(normalized_query)
}

/// Entries containing `query` as a case-insensitive substring, in their
/// original order. A blank query keeps every entry.
pub fn filter<'a>(entries: &'a [FaqEntry], query: &str) -> Vec<&'a FaqEntry> {
    let normalized = normalize_query(query);
    if normalized.is_empty() {
        return entries.iter().collect();
    }
    entries
        .iter()
        .filter(|entry| haystack_matches(&haystack(entry), &normalized))
        .collect()
}
