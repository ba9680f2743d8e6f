//! Game keyword tags such as `<shield+2>` or `<reaction>`.
//!
//! Tags are rewritten into `[[KEYWORD|tone|LABEL]]` markers before markdown
//! parsing, so the parser never sees (or escapes) them, and the markers are
//! expanded into badges once the HTML exists.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

/// Visual category of a keyword badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Green,
    Pink,
    BrightGreen,
}

impl Tone {
    pub const ALL: [Tone; 3] = [Tone::Green, Tone::Pink, Tone::BrightGreen];

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Green => "green",
            Tone::Pink => "pink",
            Tone::BrightGreen => "bgreen",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tone| tone.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognised keyword: its tone and the visible label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub tone: Tone,
    pub label: String,
}

struct KeywordRule {
    name: &'static str,
    tone: Tone,
    pattern: Regex,
}

impl KeywordRule {
    fn plain(name: &'static str, tone: Tone) -> Self {
        Self::compile(name, tone, format!(r"(?i)<{name}\s*>"))
    }

    fn parameterized(name: &'static str, tone: Tone) -> Self {
        Self::compile(name, tone, format!(r"(?i)<{name}\s*([+\d]+)?\s*>"))
    }

    fn compile(name: &'static str, tone: Tone, pattern: String) -> Self {
        Self {
            name,
            tone,
            pattern: Regex::new(&pattern).expect("keyword pattern compiles"),
        }
    }

    fn label(&self, captures: &Captures<'_>) -> String {
        let base = self.name.to_ascii_uppercase();
        let suffix = captures.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if suffix.is_empty() {
            base
        } else {
            format!("{base} {}", suffix.to_uppercase())
        }
    }
}

// Declaration order is the tie-break when two tags match at the same offset.
static RULES: Lazy<Vec<KeywordRule>> = Lazy::new(|| {
    vec![
        KeywordRule::plain("reaction", Tone::Green),
        KeywordRule::plain("action", Tone::Green),
        KeywordRule::plain("hidden", Tone::Green),
        KeywordRule::parameterized("shield", Tone::Pink),
        KeywordRule::parameterized("assault", Tone::Pink),
        KeywordRule::plain("tank", Tone::Pink),
        KeywordRule::plain("deflect", Tone::BrightGreen),
        KeywordRule::plain("deathknell", Tone::BrightGreen),
        KeywordRule::plain("temporary", Tone::BrightGreen),
    ]
});

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[\[KEYWORD\|([a-z]+)\|([^\]]+)\]\]").expect("marker pattern compiles")
});

/// Builds the intermediate marker for a keyword.
pub fn marker(tone: Tone, label: &str) -> String {
    format!("[[KEYWORD|{tone}|{}]]", label.trim())
}

/// Rewrites every recognised keyword tag in `content` into a marker.
///
/// The scan is a single left-to-right pass. At each position the earliest
/// match wins; ties go to the longest match, then to the rule declared first.
/// Text that matches no rule is copied through untouched.
pub fn tokenize(content: &str) -> String {
    let mut output = String::with_capacity(content.len());
    let mut cursor = 0;
    while cursor < content.len() {
        let best = RULES
            .iter()
            .enumerate()
            .filter_map(|(rank, rule)| {
                let captures = rule.pattern.captures_at(content, cursor)?;
                let whole = captures.get(0)?;
                Some((rank, rule, whole.start(), whole.end(), captures))
            })
            .min_by(|a, b| {
                a.2.cmp(&b.2)
                    .then_with(|| (b.3 - b.2).cmp(&(a.3 - a.2)))
                    .then_with(|| a.0.cmp(&b.0))
            });
        let Some((_, rule, start, end, captures)) = best else {
            break;
        };
        output.push_str(&content[cursor..start]);
        output.push_str(&marker(rule.tone, &rule.label(&captures)));
        cursor = end;
    }
    output.push_str(&content[cursor..]);
    output
}

/// Replaces every marker in `text` with whatever `render` returns for it.
///
/// Markers naming an unknown tone are left as literal text; see
/// [`strip_markers`] for the plain-text case.
pub fn expand_markers<F>(text: &str, mut render: F) -> String
where
    F: FnMut(Tone, &str) -> String,
{
    MARKER
        .replace_all(text, |captures: &Captures<'_>| {
            match Tone::from_name(&captures[1]) {
                Some(tone) => render(tone, &captures[2]),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

/// Expands markers into styled badge spans. Runs on parsed HTML.
pub fn detokenize(html: &str) -> String {
    expand_markers(html, |tone, label| {
        format!("<span data-keyword-{tone}><span>{label}</span></span>")
    })
}

/// Replaces markers with their bare label, dropping the tone. Unlike
/// [`expand_markers`] this also unwraps markers whose tone is unknown.
pub fn strip_markers(text: &str) -> String {
    MARKER.replace_all(text, "$2").into_owned()
}

/// Keywords mentioned in `content`, in order of appearance.
pub fn keywords(content: &str) -> Vec<Keyword> {
    let tokenized = tokenize(content);
    MARKER
        .captures_iter(&tokenized)
        .filter_map(|captures| {
            Some(Keyword {
                tone: Tone::from_name(&captures[1])?,
                label: captures[2].to_string(),
            })
        })
        .collect()
}
