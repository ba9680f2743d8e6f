use crate::keyword::{detokenize, tokenize};
use markdown::{Options as MarkdownOptions, to_html_with_options};
use tracing::debug;

/// Whether rendered content may carry raw HTML through to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trust {
    /// Author-controlled content; raw HTML and any link protocol pass through.
    #[default]
    Trusted,
    /// Raw HTML is escaped and dangerous link protocols are dropped.
    Untrusted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub decorate_keywords: bool,
    pub inline: bool,
    pub trust: Trust,
}

impl RenderOptions {
    /// Block rendering with keyword badges, used for detail text.
    pub const fn block() -> Self {
        Self {
            decorate_keywords: true,
            inline: false,
            trust: Trust::Trusted,
        }
    }

    /// Inline rendering with keyword badges, used for titles and short answers.
    pub const fn inline() -> Self {
        Self {
            decorate_keywords: true,
            inline: true,
            trust: Trust::Trusted,
        }
    }

    pub const fn with_trust(mut self, trust: Trust) -> Self {
        self.trust = trust;
        self
    }

    pub const fn without_keywords(mut self) -> Self {
        self.decorate_keywords = false;
        self
    }
}

/// Converts markdown into an HTML fragment.
pub fn render(content: &str, options: RenderOptions) -> String {
    let prepared = if options.decorate_keywords {
        tokenize(content)
    } else {
        content.to_string()
    };
    let source = if options.inline {
        inline_source(&prepared)
    } else {
        hard_wrap(&prepared)
    };
    if source.trim().is_empty() {
        return String::new();
    }
    let parsed = match to_html_with_options(&source, &markdown_options(options.trust)) {
        Ok(html) => html,
        Err(_) => {
            debug!(len = source.len(), "markdown parse failed; emitting escaped source");
            escape_html(&source)
        }
    };
    let html = if options.inline {
        unwrap_paragraph(&parsed).to_string()
    } else {
        parsed
    };
    if options.decorate_keywords {
        detokenize(&html)
    } else {
        html
    }
}

fn markdown_options(trust: Trust) -> MarkdownOptions {
    let mut options = MarkdownOptions::gfm();
    if trust == Trust::Trusted {
        // Dataset entries embed trusted HTML, so allow it through.
        options.compile.allow_dangerous_html = true;
        options.compile.allow_dangerous_protocol = true;
        options.compile.gfm_tagfilter = false;
    }
    options
}

/// Appends a hard break to every line followed by another text line, so
/// single newlines render as `<br />` the way the dataset is authored.
fn hard_wrap(source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut output = String::with_capacity(source.len() + lines.len() * 3);
    let mut in_fence = false;
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        }
        output.push_str(line);
        let next_is_text = lines
            .get(idx + 1)
            .is_some_and(|next| !next.trim().is_empty());
        if !in_fence && !line.trim().is_empty() && next_is_text && !line.ends_with("  ") {
            output.push_str("  ");
        }
        output.push('\n');
    }
    output
}

/// Flattens `source` into one paragraph with hard breaks between lines and
/// escapes any line-leading syntax that would open a block.
fn inline_source(source: &str) -> String {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(neutralize_block_start)
        .collect::<Vec<_>>()
        .join("  \n")
}

fn neutralize_block_start(line: &str) -> String {
    let mut chars = line.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = chars.as_str();
    let escape = match first {
        '#' | '>' | '=' | '|' => true,
        '-' | '+' | '*' | '_' => {
            rest.is_empty()
                || rest.starts_with([' ', '\t'])
                || rest.chars().all(|ch| ch == first || ch == ' ')
        }
        '`' | '~' => rest.starts_with(first) && rest[first.len_utf8()..].starts_with(first),
        '[' => opens_link_definition(rest),
        _ => false,
    };
    if escape {
        return format!("\\{line}");
    }
    if let Some(split) = ordered_list_marker(line) {
        return format!("{}\\{}", &line[..split], &line[split..]);
    }
    line.to_string()
}

/// `rest` follows a leading `[`: true for `label]:`, which would parse as a
/// link reference definition and vanish.
fn opens_link_definition(rest: &str) -> bool {
    match rest.find(']') {
        Some(end) if end > 0 => rest[end + 1..].starts_with(':'),
        _ => false,
    }
}

/// Byte offset of the `.`/`)` in a line opening with an ordered list marker.
fn ordered_list_marker(line: &str) -> Option<usize> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 9 {
        return None;
    }
    let rest = &line[digits..];
    let mut tail = rest.chars();
    match tail.next() {
        Some('.') | Some(')') => {
            let after = tail.as_str();
            (after.is_empty() || after.starts_with([' ', '\t'])).then_some(digits)
        }
        _ => None,
    }
}

fn unwrap_paragraph(html: &str) -> &str {
    let trimmed = html.trim();
    match trimmed
        .strip_prefix("<p>")
        .and_then(|inner| inner.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => inner,
        _ => trimmed,
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_render_wraps_paragraphs() {
        let html = render("Hola **mundo**", RenderOptions::block());
        assert_eq!(html.trim(), "<p>Hola <strong>mundo</strong></p>");
    }

    #[test]
    fn inline_render_has_no_wrapping_block() {
        let html = render("¿Qué es *Shield*?", RenderOptions::inline());
        assert_eq!(html, "¿Qué es <em>Shield</em>?");
    }

    #[test]
    fn inline_render_does_not_open_headings_or_lists() {
        let heading = render("# no heading", RenderOptions::inline());
        assert!(!heading.contains("<h1"), "{heading}");
        let list = render("- not a list", RenderOptions::inline());
        assert!(!list.contains("<ul"), "{list}");
        let ordered = render("1. not a list", RenderOptions::inline());
        assert!(!ordered.contains("<ol"), "{ordered}");
        assert!(ordered.contains("1. not a list"), "{ordered}");
        let definition = render("[regla]: https://x.example", RenderOptions::inline());
        assert!(definition.contains("[regla]:"), "{definition}");
        let link = render("[regla](https://x.example)", RenderOptions::inline());
        assert!(link.contains("<a href=\"https://x.example\">regla</a>"), "{link}");
    }

    #[test]
    fn single_newlines_become_breaks() {
        let html = render("first\nsecond", RenderOptions::block());
        assert!(html.contains("<br />"), "{html}");
        let inline = render("first\nsecond", RenderOptions::inline());
        assert!(inline.contains("<br />"), "{inline}");
    }

    #[test]
    fn keywords_survive_markdown() {
        let html = render("Gana <shield+2> y _algo_.", RenderOptions::inline());
        assert!(
            html.contains("<span data-keyword-pink><span>SHIELD +2</span></span>"),
            "{html}"
        );
        assert!(html.contains("<em>algo</em>"), "{html}");
    }

    #[test]
    fn keywords_left_alone_without_decoration() {
        let html = render(
            "Gana <shield+2>.",
            RenderOptions::inline()
                .without_keywords()
                .with_trust(Trust::Untrusted),
        );
        assert!(!html.contains("data-keyword"), "{html}");
        assert!(html.contains("&lt;shield+2&gt;"), "{html}");
    }

    #[test]
    fn trusted_render_keeps_raw_html() {
        let html = render("<b>bold</b> text", RenderOptions::inline());
        assert!(html.contains("<b>bold</b>"), "{html}");
    }

    #[test]
    fn untrusted_render_escapes_raw_html_but_keeps_badges() {
        let html = render(
            "<script>alert(1)</script> <tank>",
            RenderOptions::inline().with_trust(Trust::Untrusted),
        );
        assert!(!html.contains("<script>"), "{html}");
        assert!(html.contains("data-keyword-pink"), "{html}");
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render("", RenderOptions::block()), "");
        assert_eq!(render("   \n ", RenderOptions::inline()), "");
    }

    #[test]
    fn fenced_code_lines_are_not_wrapped() {
        let wrapped = hard_wrap("```\na\nb\n```\n");
        assert_eq!(wrapped, "```\na\nb\n```\n");
    }
}
