use std::cmp;
use std::error::Error;
use std::io::{self, Read};
use std::path::PathBuf;

use atty::Stream;
use clap::{Parser, Subcommand};
use riftbound_faq::keyword::expand_markers;
use riftbound_faq::plain::to_plain_text;
use riftbound_faq::{
    DetailSection, EntryRef, FaqStore, RenderOptions, Rule, Trust, keyword, render,
};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "riftbound-faq", about = "Browse the Riftbound rules FAQ", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Load entries from this JSON file instead of the bundled dataset.
    #[arg(long, global = true, env = "RIFTBOUND_FAQ_DATA")]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List entries whose text contains the query (case-insensitive).
    Search {
        /// Words to search for; an empty query lists every entry.
        query: Vec<String>,
        /// Maximum number of entries to print.
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one entry with its detail sections.
    Show {
        /// Anchor of the entry, with or without the leading `#`.
        anchor: String,
    },
    /// Render a markdown snippet the way the FAQ page does.
    Render {
        /// Markdown source; read from stdin when omitted.
        text: Option<String>,
        /// Render without a surrounding paragraph.
        #[arg(long)]
        inline: bool,
        /// Print the plain-text projection instead of HTML.
        #[arg(long, conflicts_with = "inline")]
        plain: bool,
        /// Leave keyword tags undecorated.
        #[arg(long)]
        no_keywords: bool,
        /// Escape raw HTML in the source.
        #[arg(long)]
        untrusted: bool,
    },
    /// List entry anchors that start with the provided prefix.
    Anchors {
        #[arg(default_value = "faq-")]
        prefix: String,
        /// Maximum number of matches to return.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Serve the FAQ page over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Socket address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Public base URL used for canonical links.
        #[arg(long)]
        base_url: Option<String>,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    let store = load_store(cli.data)?;
    match cli.command {
        Command::Search { query, limit } => handle_search(store, &query.join(" "), limit, cli.json),
        Command::Show { anchor } => handle_show(store, &anchor, cli.json),
        Command::Render {
            text,
            inline,
            plain,
            no_keywords,
            untrusted,
        } => {
            let mut options = if inline {
                RenderOptions::inline()
            } else {
                RenderOptions::block()
            };
            if no_keywords {
                options = options.without_keywords();
            }
            if untrusted {
                options = options.with_trust(Trust::Untrusted);
            }
            handle_render(text, options, plain, cli.json)
        }
        Command::Anchors { prefix, limit } => handle_anchors(store, &prefix, limit, cli.json),
        #[cfg(feature = "web")]
        Command::Serve { addr, base_url } => handle_serve(store, addr, base_url),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// The store outlives every command, so a custom dataset is leaked to get the
/// same `'static` lifetime as the bundled one.
fn load_store(path: Option<PathBuf>) -> Result<&'static FaqStore, Box<dyn Error>> {
    match path {
        Some(path) => {
            let store = FaqStore::from_json_path(&path)?;
            debug!(path = %path.display(), entries = store.len(), "loaded FAQ dataset");
            Ok(Box::leak(Box::new(store)))
        }
        None => Ok(FaqStore::bundled()),
    }
}

fn handle_search(
    store: &FaqStore,
    query: &str,
    limit: Option<usize>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let results = store.search(query);
    let limit = limit.map(|limit| cmp::max(1, limit)).unwrap_or(results.len());
    let hits = &results.hits[..cmp::min(limit, results.len())];

    if as_json {
        let payload = json!({
            "query": results.query,
            "total": results.len(),
            "results": hits.iter().map(summary_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if results.is_empty() {
        println!("{}", results.empty_message());
    } else {
        print_search_table(hits);
    }
    Ok(())
}

fn handle_show(store: &FaqStore, anchor: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let anchor = riftbound_faq::anchor::sanitize_fragment(anchor.trim());
    let entry = store
        .by_anchor(anchor)
        .ok_or_else(|| format!("No entry found for anchor {anchor:?}"))?;

    if as_json {
        let mut payload = summary_json(&entry);
        payload["entry"] = serde_json::to_value(entry.entry())?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_entry(&entry);
    }
    Ok(())
}

fn handle_render(
    text: Option<String>,
    options: RenderOptions,
    plain: bool,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let source = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let output = if plain {
        to_plain_text(&source)
    } else {
        render(&source, options)
    };

    if as_json {
        let payload = json!({
            "source": source,
            "output": output,
            "keywords": keyword::keywords(&source)
                .iter()
                .map(|kw| json!({"tone": kw.tone.as_str(), "label": kw.label}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{output}");
    }
    Ok(())
}

fn handle_anchors(
    store: &FaqStore,
    prefix: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let limit = cmp::max(1, limit);
    let matches = store.anchors_with_prefix(prefix, limit);

    if as_json {
        let payload = json!({
            "prefix": prefix,
            "limit": limit,
            "results": matches.iter().map(|entry| {
                json!({"anchor": entry.anchor(), "id": entry.id()})
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if matches.is_empty() {
        println!("No anchors matched prefix \"{prefix}\".");
    } else {
        let width = matches
            .iter()
            .map(|entry| entry.anchor().len())
            .max()
            .unwrap_or(prefix.len())
            .max("ANCHOR".len());
        println!("{:<width$}  TITLE", "ANCHOR", width = width);
        println!("{:-<width$}  -----", "", width = width);
        for entry in &matches {
            println!("{:<width$}  {}", entry.anchor(), entry.plain_title(), width = width);
        }
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(
    store: &'static FaqStore,
    addr: std::net::SocketAddr,
    base_url: Option<String>,
) -> Result<(), Box<dyn Error>> {
    use riftbound_faq::web::{WebConfig, serve};

    let config = WebConfig {
        addr,
        base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, store))?;
    Ok(())
}

fn summary_json(entry: &EntryRef<'_>) -> serde_json::Value {
    json!({
        "id": entry.id(),
        "anchor": entry.anchor(),
        "title": entry.plain_title(),
        "short_answer": to_plain_text(&entry.entry().short_answer),
    })
}

fn print_search_table(hits: &[EntryRef<'_>]) {
    let width = hits
        .iter()
        .map(|entry| entry.anchor().len())
        .max()
        .unwrap_or(0)
        .max("ANCHOR".len());
    println!("{:<width$}  TITLE", "ANCHOR", width = width);
    println!("{:-<width$}  -----", "", width = width);
    for entry in hits {
        println!("{:<width$}  {}", entry.anchor(), entry.plain_title(), width = width);
    }
}

fn print_entry(entry: &EntryRef<'_>) {
    println!("{} (#{})", entry.plain_title(), entry.anchor());
    render_markdown_block("Respuesta", &entry.entry().short_answer);

    for section in entry.sections() {
        match section {
            DetailSection::Text { text } => render_markdown_block("Detalle", text),
            DetailSection::RuleReference { rules } if !rules.is_empty() => {
                println!("\nReglas:");
                for rule in rules {
                    println!("{}", rule_line(rule));
                }
            }
            DetailSection::CardImage { cards } if !cards.is_empty() => {
                println!("\nCartas:");
                for card in cards {
                    println!("- {}", to_plain_text(&card.text).replace('\n', " "));
                    println!("    {}", card.url);
                    if let Some(errata) = card.errata.as_deref().filter(|e| !e.is_empty()) {
                        println!("    Errata: {}", to_plain_text(errata));
                    }
                }
            }
            _ => {}
        }
    }
}

fn rule_line(rule: &Rule) -> String {
    let indent = "  ".repeat(rule.indent_level());
    format!("{indent}{}  {}", rule.number, terminal_markdown(&rule.text))
}

/// Keyword tags as bold bracketed labels, which termimad can style.
fn terminal_markdown(source: &str) -> String {
    expand_markers(&keyword::tokenize(source), |_, label| format!("**[{label}]**"))
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let source = terminal_markdown(body);
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
