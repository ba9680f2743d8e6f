use crate::keyword::{strip_markers, tokenize};
use once_cell::sync::Lazy;
use regex::Regex;

static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("link pattern compiles"));
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`]").expect("emphasis pattern compiles"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern compiles"));

/// Markup-free projection of a markdown string, used for search haystacks,
/// `alt` text and entry identifiers.
///
/// Keyword tags collapse to their label, links to their text; emphasis and
/// code delimiters and any literal HTML tags are removed.
pub fn to_plain_text(content: &str) -> String {
    let labelled = strip_markers(&tokenize(content));
    let unlinked = LINK.replace_all(&labelled, "$1");
    let unemphasized = EMPHASIS.replace_all(&unlinked, "");
    let untagged = TAG.replace_all(&unemphasized, "");
    untagged.trim().to_string()
}
