use crate::disclosure::{Action, Effect, PageState, Transition, reduce};
use crate::plain::to_plain_text;
use crate::{DetailSection, EntryRef, FaqEntry, FaqStore, RenderOptions, render};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;
const MAX_ANCHOR_RESULTS: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub store: &'static FaqStore,
    pub base_url: String,
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub base_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig, store: &'static FaqStore) -> Result<(), WebError> {
    let state = Arc::new(AppState {
        store,
        base_url: config.base_url.clone(),
    });
    let router = build_router(state);
    info!(
        %config.addr,
        base = %config.base_url,
        entries = store.len(),
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(faq_page))
        .route("/api/search", get(api_search))
        .route("/api/entry", get(api_entry))
        .route("/api/anchors", get(api_anchors))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "riftbound-faq",
        "entries": state.store.len(),
    }))
}

/// Page state travels in the query string: `q` is the search term, `open`
/// the comma-separated identifiers of expanded entries, `at` the current
/// fragment and `toggle` the identifier of the entry being clicked. Entries
/// are addressed by identifier because anchors may collide. A request without
/// `open` is a fresh page load and treats `at` as the deep link.
#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    q: Option<String>,
    open: Option<String>,
    at: Option<String>,
    toggle: Option<String>,
}

async fn faq_page(State(state): State<SharedState>, Query(params): Query<PageQuery>) -> Response {
    let store = state.store;
    let page = restore_state(store, &params);

    if let Some(target) = params.toggle.as_deref().and_then(|id| store.by_identifier(id)) {
        let transition = reduce(store, &page, Action::toggle(&target));
        return Redirect::to(&redirect_location(store, &transition)).into_response();
    }

    match FaqTemplate::build(store, &page, &state.base_url).and_then(|template| template.render()) {
        Ok(html) => Html(html).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(render_error_page(err.to_string())),
        )
            .into_response(),
    }
}

fn restore_state(store: &FaqStore, params: &PageQuery) -> PageState {
    let search = Action::Search(params.q.clone().unwrap_or_default());
    let searched = reduce(store, &PageState::default(), search).state;
    match params.open.as_deref() {
        Some(open) => {
            let mut page = searched;
            page.open_items = open
                .split(',')
                .filter(|part| !part.is_empty())
                .filter_map(|part| percent_decode_str(part).decode_utf8().ok())
                .filter_map(|id| store.by_identifier(&id))
                .map(|entry| entry.id().to_string())
                .collect();
            page.fragment = params.at.clone().filter(|at| !at.is_empty());
            page
        }
        None => {
            let mount = Action::Mount {
                fragment: params.at.clone(),
            };
            reduce(store, &searched, mount).state
        }
    }
}

/// Canonical URL for the state after a transition. A scroll request becomes
/// the URL fragment so the browser jumps to the expanded entry.
fn redirect_location(store: &FaqStore, transition: &Transition) -> String {
    let mut location = page_href(store, &transition.state, None);
    for effect in &transition.effects {
        if let Effect::ScrollIntoView(anchor) = effect {
            location.push('#');
            location.push_str(anchor);
        }
    }
    location
}

fn page_href(store: &FaqStore, page: &PageState, toggle: Option<&str>) -> String {
    let mut href = format!(
        "/?q={}&open={}",
        encode_component(&page.search_term),
        encode_component(&open_param(store, page))
    );
    if let Some(fragment) = &page.fragment {
        href.push_str("&at=");
        href.push_str(&encode_component(fragment));
    }
    if let Some(id) = toggle {
        href.push_str("&toggle=");
        href.push_str(&encode_component(id));
    }
    href
}

fn open_param(store: &FaqStore, page: &PageState) -> String {
    page.open_items
        .iter()
        .filter(|id| store.by_identifier(id).is_some())
        .map(|id| escape_open_item(id))
        .collect::<Vec<_>>()
        .join(",")
}

/// Identifiers may contain `,`, so each one is escaped before joining.
/// `restore_state` undoes this with `percent_decode_str`.
fn escape_open_item(id: &str) -> String {
    id.replace('%', "%25").replace(',', "%2C")
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntryParams {
    anchor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnchorParams {
    prefix: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntrySummaryPayload {
    id: String,
    anchor: String,
    title: String,
    short_answer: String,
    title_html: String,
    short_answer_html: String,
}

impl EntrySummaryPayload {
    fn from_entry(entry: &EntryRef<'_>) -> Self {
        Self {
            id: entry.id().to_string(),
            anchor: entry.anchor().to_string(),
            title: entry.plain_title().to_string(),
            short_answer: to_plain_text(&entry.entry().short_answer),
            title_html: entry.title_html(),
            short_answer_html: entry.short_answer_html(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchResponsePayload {
    query: String,
    total: usize,
    results: Vec<EntrySummaryPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryPayload {
    #[serde(flatten)]
    summary: EntrySummaryPayload,
    detail_html: String,
    entry: FaqEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnchorHitPayload {
    anchor: String,
    id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnchorsPayload {
    prefix: String,
    results: Vec<AnchorHitPayload>,
}

async fn api_search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponsePayload> {
    let results = state.store.search(params.q.as_deref().unwrap_or_default());
    Json(SearchResponsePayload {
        query: results.query.clone(),
        total: state.store.len(),
        results: results
            .hits
            .iter()
            .map(EntrySummaryPayload::from_entry)
            .collect(),
    })
}

async fn api_entry(
    State(state): State<SharedState>,
    Query(params): Query<EntryParams>,
) -> Result<Json<EntryPayload>, ApiError> {
    let anchor = params
        .anchor
        .as_deref()
        .map(str::trim)
        .filter(|anchor| !anchor.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `anchor` is required"))?;
    let entry = state
        .store
        .by_anchor(crate::anchor::sanitize_fragment(anchor))
        .ok_or_else(|| ApiError::not_found(format!("No entry found for anchor {anchor:?}")))?;
    let detail_html = render_details(entry.sections())
        .map_err(|err| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        })?;
    Ok(Json(EntryPayload {
        summary: EntrySummaryPayload::from_entry(&entry),
        detail_html,
        entry: entry.entry().clone(),
    }))
}

async fn api_anchors(
    State(state): State<SharedState>,
    Query(params): Query<AnchorParams>,
) -> Json<AnchorsPayload> {
    let prefix = params.prefix.unwrap_or_default();
    let limit = params.limit.unwrap_or(10).clamp(1, MAX_ANCHOR_RESULTS);
    let results = state
        .store
        .anchors_with_prefix(&prefix, limit)
        .iter()
        .map(|entry| AnchorHitPayload {
            anchor: entry.anchor().to_string(),
            id: entry.id().to_string(),
        })
        .collect();
    Json(AnchorsPayload { prefix, results })
}

struct EntryView {
    anchor: String,
    panel_id: String,
    title_html: String,
    short_answer_html: String,
    is_open: bool,
    toggle_href: String,
    detail_html: String,
}

struct SectionView {
    html: Option<String>,
    rules: Vec<RuleView>,
    cards: Vec<CardView>,
}

struct RuleView {
    number: String,
    indent: usize,
    html: String,
}

struct CardView {
    url: String,
    alt: String,
    html: String,
    errata_html: Option<String>,
}

impl SectionView {
    /// `None` for sections that render nothing: unknown types and empty lists.
    fn build(section: &DetailSection) -> Option<Self> {
        let empty = Self {
            html: None,
            rules: Vec::new(),
            cards: Vec::new(),
        };
        match section {
            DetailSection::Text { text } => Some(Self {
                html: Some(render(text, RenderOptions::block())),
                ..empty
            }),
            DetailSection::RuleReference { rules } if !rules.is_empty() => Some(Self {
                rules: rules
                    .iter()
                    .map(|rule| RuleView {
                        number: rule.number.clone(),
                        indent: rule.indent_level(),
                        html: render(&rule.text, RenderOptions::inline()),
                    })
                    .collect(),
                ..empty
            }),
            DetailSection::CardImage { cards } if !cards.is_empty() => Some(Self {
                cards: cards
                    .iter()
                    .map(|card| CardView {
                        url: card.url.clone(),
                        alt: to_plain_text(&card.text),
                        html: render(&card.text, RenderOptions::block()),
                        errata_html: card
                            .errata
                            .as_deref()
                            .filter(|errata| !errata.is_empty())
                            .map(|errata| render(errata, RenderOptions::inline())),
                    })
                    .collect(),
                ..empty
            }),
            _ => None,
        }
    }
}

fn render_details(sections: &[DetailSection]) -> Result<String, askama::Error> {
    DetailTemplate {
        sections: sections.iter().filter_map(SectionView::build).collect(),
    }
    .render()
}

impl FaqTemplate {
    fn build(store: &FaqStore, page: &PageState, base_url: &str) -> Result<Self, askama::Error> {
        let results = store.search(&page.search_term);
        let entries = results
            .hits
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let is_open = page.is_open(entry.id());
                let detail_html = if is_open {
                    render_details(entry.sections())?
                } else {
                    String::new()
                };
                Ok(EntryView {
                    anchor: entry.anchor().to_string(),
                    panel_id: format!("question-details-{position}"),
                    title_html: entry.title_html(),
                    short_answer_html: entry.short_answer_html(),
                    is_open,
                    toggle_href: page_href(store, page, Some(entry.id())),
                    detail_html,
                })
            })
            .collect::<Result<Vec<_>, askama::Error>>()?;
        Ok(Self {
            canonical_url: format!("{base_url}/"),
            search_term: page.search_term.clone(),
            open_param: open_param(store, page),
            empty_message: results.is_empty().then(|| results.empty_message()),
            entries,
        })
    }
}

fn render_error_page(message: impl Into<String>) -> String {
    let message = crate::render::escape_html(&message.into());
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>FAQ Riftbound • Error</title>
  </head>
  <body>
    <main>
      <h1>Algo salió mal</h1>
      <p>{message}</p>
      <a href="/">Volver al inicio</a>
    </main>
  </body>
</html>"#
    )
}

#[derive(Template)]
#[template(
    source = r#"{% for section in sections %}
<section class="detail">
  {% if let Some(html) = section.html %}
  <div class="detail-text">{{ html|safe }}</div>
  {% endif %}
  {% if !section.rules.is_empty() %}
  <div class="rules">
    {% for rule in section.rules %}
    <div class="rule" data-indent="{{ rule.indent }}">
      <span class="rule-number">{{ rule.number }}</span>
      <div class="rule-text" style="padding-left: {{ rule.indent }}rem">{{ rule.html|safe }}</div>
    </div>
    {% endfor %}
  </div>
  {% endif %}
  {% if !section.cards.is_empty() %}
  <div class="cards">
    {% for card in section.cards %}
    <figure class="card-image">
      <img src="{{ card.url }}" alt="{{ card.alt }}" loading="lazy" />
      <figcaption>{{ card.html|safe }}</figcaption>
      {% if let Some(errata) = card.errata_html %}
      <div class="errata">{{ errata|safe }}</div>
      {% endif %}
    </figure>
    {% endfor %}
  </div>
  {% endif %}
</section>
{% endfor %}"#,
    ext = "html"
)]
struct DetailTemplate {
    sections: Vec<SectionView>,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="es">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>FAQ Riftbound Chile</title>
    <link rel="canonical" href="{{ canonical_url }}">
    <style>
      body { font-family: system-ui, sans-serif; margin: 0; background: #0f172a; color: #e2e8f0; }
      main { max-width: 56rem; margin: 0 auto; padding: 2rem 1rem; }
      article { background: rgba(148, 163, 184, 0.08); border-radius: 0.5rem; margin: 1rem 0; padding: 1rem 1.25rem; }
      article header { display: flex; gap: 1rem; align-items: flex-start; }
      article header div { flex: 1; }
      .toggle { color: inherit; text-decoration: none; font-size: 1.25rem; }
      .short-answer, .detail-text, .rule-text { color: #94a3b8; }
      .rule { display: grid; grid-template-columns: 6rem 1fr; gap: 0.5rem; margin: 0.5rem 0; }
      .rule-number { font-weight: 600; }
      .cards { display: flex; flex-wrap: wrap; gap: 1rem; justify-content: space-around; }
      .card-image { max-width: 220px; text-align: center; font-size: 0.8125rem; margin: 0; }
      .card-image img { width: 100%; border-radius: 0.25rem; }
      .errata { color: #f59e0b; font-style: italic; }
      [data-keyword-bgreen], [data-keyword-green], [data-keyword-pink] {
        display: inline-flex; align-items: center; justify-content: center;
        min-width: 2.25rem; padding: 0.1rem 0.3rem; margin: 0 0.25rem;
        font-size: 0.75rem; font-weight: 1000; font-style: normal; text-transform: uppercase;
        color: #ffffff; box-shadow: 0 0 0 1px rgba(15, 23, 42, 0.2);
        transform: skewX(-20deg); border-radius: 4px;
      }
      [data-keyword-bgreen] { background-color: #14e06d; color: #000000; }
      [data-keyword-green] { background-color: #258338; }
      [data-keyword-pink] { background-color: #e53277; }
    </style>
  </head>
  <body>
    <main>
      <section class="intro">
        <h1>FAQ Riftbound Chile</h1>
        <p>Este compendio reúne preguntas frecuentes de la comunidad y ofrece respuestas fundamentadas directamente en el reglamento oficial de Riftbound.</p>
      </section>

      <form method="get" action="/" role="search">
        <input type="search" name="q" value="{{ search_term }}" placeholder="Buscar pregunta, regla o palabra clave..." />
        <input type="hidden" name="open" value="{{ open_param }}" />
      </form>

      {% for entry in entries %}
      <article id="{{ entry.anchor }}">
        <header>
          <div>
            <h2>{{ entry.title_html|safe }}</h2>
            <p class="short-answer">{{ entry.short_answer_html|safe }}</p>
          </div>
          <a class="toggle" href="{{ entry.toggle_href }}" aria-expanded="{{ entry.is_open }}" aria-controls="{{ entry.panel_id }}"
             aria-label="{% if entry.is_open %}Ocultar detalles{% else %}Mostrar detalles{% endif %}">{% if entry.is_open %}▲{% else %}▼{% endif %}</a>
        </header>
        {% if entry.is_open %}
        <div id="{{ entry.panel_id }}" class="details">{{ entry.detail_html|safe }}</div>
        {% endif %}
      </article>
      {% endfor %}

      {% if let Some(message) = empty_message %}
      <p class="empty">{{ message }}</p>
      {% endif %}
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct FaqTemplate {
    canonical_url: String,
    search_term: String,
    open_param: String,
    empty_message: Option<String>,
    entries: Vec<EntryView>,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request, http::header};
    use tower::ServiceExt;

    fn router_for(store: &'static FaqStore) -> Router {
        let state = Arc::new(AppState {
            store,
            base_url: "http://127.0.0.1:8080".to_string(),
        });
        build_router(state)
    }

    async fn get_from(store: &'static FaqStore, uri: &str) -> Response {
        router_for(store)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn get(uri: &str) -> Response {
        get_from(FaqStore::bundled(), uri).await
    }

    async fn body_text(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn page_lists_every_entry_collapsed() {
        let response = get("/").await;
        assert!(response.status().is_success());
        let html = body_text(response).await;
        assert_eq!(
            html.matches("<article id=\"faq-").count(),
            FaqStore::bundled().len()
        );
        assert!(!html.contains("class=\"details\""));
        assert!(html.contains("<span data-keyword-pink><span>SHIELD</span></span>"));
    }

    #[tokio::test]
    async fn search_without_hits_shows_message() {
        let html = body_text(get("/?q=xyzzy").await).await;
        assert!(html.contains("No encontramos resultados para “xyzzy”"));
        assert!(!html.contains("<article"));
    }

    #[tokio::test]
    async fn search_narrows_entries() {
        let html = body_text(get("/?q=DEFLECT").await).await;
        assert_eq!(html.matches("<article id=").count(), 1);
    }

    #[tokio::test]
    async fn deep_link_expands_entry() {
        let html = body_text(get("/?at=faq-que-es-shield").await).await;
        assert!(html.contains("id=\"question-details-0\""));
        assert!(html.contains("aria-expanded=\"true\""));
        assert!(html.contains("data-indent=\"2\""));
    }

    #[tokio::test]
    async fn unknown_deep_link_is_ignored() {
        let response = get("/?at=faq-nope").await;
        assert!(response.status().is_success());
        let html = body_text(response).await;
        assert!(!html.contains("class=\"details\""));
    }

    #[tokio::test]
    async fn toggle_open_redirects_to_fragment() {
        let response = get("/?q=&open=&toggle=que-es-shield").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            "/?q=&open=que%2Des%2Dshield&at=faq%2Dque%2Des%2Dshield#faq-que-es-shield"
        );
    }

    #[tokio::test]
    async fn toggle_close_clears_fragment() {
        let response =
            get("/?q=&open=que-es-shield&at=faq-que-es-shield&toggle=que-es-shield").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/?q=&open=");
    }

    #[tokio::test]
    async fn entries_sharing_an_anchor_toggle_independently() {
        let entries = ["¿Qué?", "Qué"]
            .into_iter()
            .map(|title| FaqEntry {
                title: title.to_string(),
                ..FaqEntry::default()
            })
            .collect();
        let store: &'static FaqStore = Box::leak(Box::new(FaqStore::new(entries).unwrap()));
        assert_eq!(store.get(0).unwrap().anchor(), store.get(1).unwrap().anchor());

        let page = body_text(get_from(store, "/").await).await;
        assert!(page.contains("toggle=%C2%BFQu%C3%A9%3F"), "{page}");
        assert!(page.contains("toggle=Qu%C3%A9\""), "{page}");

        let response = get_from(store, "/?q=&open=&toggle=Qu%C3%A9").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert_eq!(target, "/?q=&open=Qu%C3%A9&at=faq%2Dqu#faq-qu");

        let path = target.split('#').next().unwrap();
        let html = body_text(get_from(store, path).await).await;
        assert!(html.contains("<div id=\"question-details-1\""), "{html}");
        assert!(!html.contains("<div id=\"question-details-0\""), "{html}");
    }

    #[tokio::test]
    async fn open_identifiers_may_contain_commas() {
        let entries = vec![FaqEntry {
            id: Some("uno,dos".to_string()),
            title: "Coma".to_string(),
            ..FaqEntry::default()
        }];
        let store: &'static FaqStore = Box::leak(Box::new(FaqStore::new(entries).unwrap()));
        let response = get_from(store, "/?q=&open=&toggle=uno%2Cdos").await;
        let target = location(&response);
        assert!(target.starts_with("/?q=&open=uno%252Cdos&"), "{target}");
        let path = target.split('#').next().unwrap();
        let html = body_text(get_from(store, path).await).await;
        assert!(html.contains("<div id=\"question-details-0\""), "{html}");
    }

    #[tokio::test]
    async fn api_search_shield() {
        let response = get("/api/search?q=shield").await;
        assert!(response.status().is_success());
        let payload: SearchResponsePayload =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(payload.query, "shield");
        assert!(!payload.results.is_empty());
        assert!(payload.results.iter().any(|hit| hit.anchor == "faq-que-es-shield"));
    }

    #[tokio::test]
    async fn api_entry_renders_details() {
        let response = get("/api/entry?anchor=%23faq-que-es-shield").await;
        assert!(response.status().is_success());
        let payload: EntryPayload = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(payload.summary.id, "que-es-shield");
        assert!(payload.detail_html.contains("rule-number"));
    }

    #[tokio::test]
    async fn api_entry_errors() {
        assert_eq!(get("/api/entry").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            get("/api/entry?anchor=faq-nope").await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn api_anchors_by_prefix() {
        let response = get("/api/anchors?prefix=faq-qu&limit=5").await;
        let payload: AnchorsPayload = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(!payload.results.is_empty());
        assert!(payload.results.iter().all(|hit| hit.anchor.starts_with("faq-qu")));
    }

    #[test]
    fn template_build_carries_open_details() {
        let store = FaqStore::bundled();
        let page = PageState {
            open_items: ["que-es-shield".to_string()].into_iter().collect(),
            ..PageState::default()
        };
        let template = FaqTemplate::build(store, &page, "http://faq.example").unwrap();
        let open: Vec<_> = template.entries.iter().filter(|entry| entry.is_open).collect();
        assert_eq!(open.len(), 1);
        assert!(open[0].detail_html.contains("728.1.a"));
        assert!(template.entries.iter().filter(|entry| !entry.is_open).all(|entry| entry.detail_html.is_empty()));
        assert!(template.render().unwrap().contains("rel=\"canonical\""));
    }

    #[test]
    fn open_items_escape_separators() {
        assert_eq!(escape_open_item("uno,dos%"), "uno%2Cdos%25");
        assert_eq!(
            percent_decode_str(&escape_open_item("uno,dos%")).decode_utf8().unwrap(),
            "uno,dos%"
        );
    }

    #[test]
    fn unknown_and_empty_sections_render_nothing() {
        let html = render_details(&[
            DetailSection::Unknown,
            DetailSection::RuleReference { rules: Vec::new() },
            DetailSection::CardImage { cards: Vec::new() },
        ])
        .unwrap();
        assert!(!html.contains("<section"));
    }

    #[test]
    fn card_alt_text_is_plain() {
        let html = render_details(&[DetailSection::CardImage {
            cards: vec![crate::Card {
                url: "https://example.com/c.png".to_string(),
                text: "**Guardiana** <tank>".to_string(),
                errata: None,
            }],
        }])
        .unwrap();
        assert!(html.contains("alt=\"Guardiana TANK\""), "{html}");
        assert!(!html.contains("class=\"errata\""));
    }
}
