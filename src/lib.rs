mod data;

pub mod anchor;
pub mod disclosure;
pub mod keyword;
pub mod plain;
pub mod render;
pub mod search;
#[cfg(feature = "web")]
pub mod web;

pub use data::{Card, DetailSection, FaqEntry, Rule};
pub use render::{RenderOptions, Trust, render};

use anchor::anchor_id;
use fst::automaton::Str;
use fst::{Automaton, IntoStreamer, Map, MapBuilder, Streamer};
use once_cell::sync::Lazy;
use plain::to_plain_text;
use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zstd::stream::decode_all;

static DATA_BYTES: &[u8] = include_bytes!(env!("FAQ_DATA"));

static BUNDLED: Lazy<FaqStore> =
    Lazy::new(|| FaqStore::from_archive(DATA_BYTES).expect("bundled FAQ archive decodes"));

#[derive(Debug, thiserror::Error)]
pub enum FaqError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decompress FAQ archive: {0}")]
    Decompress(#[from] std::io::Error),
    #[error("invalid FAQ JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid FAQ archive: {0}")]
    Archive(String),
    #[error("failed to build anchor index: {0}")]
    Index(#[from] fst::Error),
    #[error("duplicate entry id {0:?}")]
    DuplicateId(String),
}

/// Identifier of an entry: its explicit `id`, else the plain-text title, else
/// the raw title.
pub fn entry_identifier(entry: &FaqEntry) -> String {
    if let Some(id) = explicit_id(entry) {
        return id.to_string();
    }
    let plain = to_plain_text(&entry.title);
    if plain.is_empty() {
        entry.title.clone()
    } else {
        plain
    }
}

fn explicit_id(entry: &FaqEntry) -> Option<&str> {
    entry
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

struct EntryKey {
    id: String,
    anchor: String,
    plain_title: String,
    haystack: String,
}

impl EntryKey {
    fn derive(entry: &FaqEntry) -> Self {
        let id = entry_identifier(entry);
        Self {
            anchor: anchor_id(&id),
            plain_title: to_plain_text(&entry.title),
            haystack: search::haystack(entry),
            id,
        }
    }
}

/// The immutable FAQ collection with precomputed identifiers, anchors and
/// search haystacks.
pub struct FaqStore {
    entries: Vec<FaqEntry>,
    keys: Vec<EntryKey>,
    anchors: Map<Vec<u8>>,
}

impl FaqStore {
    pub fn new(entries: Vec<FaqEntry>) -> Result<Self, FaqError> {
        let mut seen = HashSet::new();
        for id in entries.iter().filter_map(explicit_id) {
            if !seen.insert(id) {
                return Err(FaqError::DuplicateId(id.to_string()));
            }
        }
        let keys: Vec<EntryKey> = entries.iter().map(EntryKey::derive).collect();
        let anchors = build_anchor_index(&keys)?;
        debug!(entries = entries.len(), anchors = anchors.len(), "FAQ store ready");
        Ok(Self {
            entries,
            keys,
            anchors,
        })
    }

    /// The dataset compiled into the binary from `data/faq.json`.
    pub fn bundled() -> &'static FaqStore {
        &BUNDLED
    }

    pub fn from_json(source: &str) -> Result<Self, FaqError> {
        let entries: Vec<FaqEntry> = serde_json::from_str(source)?;
        Self::new(entries)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, FaqError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| FaqError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&source)
    }

    /// Decodes a zstd-compressed rkyv archive of entries as written by `build.rs`.
    pub fn from_archive(bytes: &[u8]) -> Result<Self, FaqError> {
        let decompressed = decode_all(Cursor::new(bytes))?;
        let mut aligned: AlignedVec = AlignedVec::with_capacity(decompressed.len());
        aligned.extend_from_slice(&decompressed);
        let entries = rkyv::from_bytes::<Vec<FaqEntry>, RkyvError>(&aligned)
            .map_err(|err| FaqError::Archive(err.to_string()))?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<EntryRef<'_>> {
        Some(EntryRef {
            index,
            entry: self.entries.get(index)?,
            key: self.keys.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = EntryRef<'_>> + '_ {
        (0..self.entries.len()).filter_map(move |index| self.get(index))
    }

    /// Resolves an anchor to the first entry that derives it.
    pub fn by_anchor(&self, anchor: &str) -> Option<EntryRef<'_>> {
        self.anchors
            .get(anchor)
            .and_then(|index| self.get(index as usize))
    }

    pub fn by_identifier(&self, id: &str) -> Option<EntryRef<'_>> {
        self.iter().find(|entry| entry.id() == id)
    }

    /// Up to `limit` entries whose anchor starts with `prefix`, in anchor order.
    pub fn anchors_with_prefix(&self, prefix: &str, limit: usize) -> Vec<EntryRef<'_>> {
        let automaton = Str::new(prefix).starts_with();
        let mut stream = self.anchors.search(automaton).into_stream();
        let mut results = Vec::new();
        while let Some((_, index)) = stream.next() {
            if let Some(entry) = self.get(index as usize) {
                results.push(entry);
            }
            if results.len() >= limit {
                break;
            }
        }
        results
    }

    /// Entries matching `query`, see [`search::filter`].
    pub fn search(&self, query: &str) -> SearchResults<'_> {
        let normalized = search::normalize_query(query);
        let hits = self
            .iter()
            .filter(|entry| search::haystack_matches(&entry.key.haystack, &normalized))
            .collect();
        SearchResults {
            query: query.trim().to_string(),
            hits,
        }
    }
}

fn build_anchor_index(keys: &[EntryKey]) -> Result<Map<Vec<u8>>, FaqError> {
    let mut pairs: Vec<(&str, usize)> = keys
        .iter()
        .enumerate()
        .filter(|(_, key)| !key.anchor.is_empty())
        .map(|(index, key)| (key.anchor.as_str(), index))
        .collect();
    pairs.sort();
    let mut builder = MapBuilder::memory();
    let mut previous: Option<&str> = None;
    for (anchor, index) in pairs {
        if previous == Some(anchor) {
            warn!(anchor, index, "anchor already taken by an earlier entry");
            continue;
        }
        builder.insert(anchor, index as u64)?;
        previous = Some(anchor);
    }
    Ok(Map::new(builder.into_inner()?)?)
}

/// A borrowed entry together with its derived keys.
#[derive(Clone, Copy)]
pub struct EntryRef<'a> {
    index: usize,
    entry: &'a FaqEntry,
    key: &'a EntryKey,
}

impl<'a> EntryRef<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn entry(&self) -> &'a FaqEntry {
        self.entry
    }

    pub fn id(&self) -> &'a str {
        &self.key.id
    }

    pub fn anchor(&self) -> &'a str {
        &self.key.anchor
    }

    pub fn plain_title(&self) -> &'a str {
        &self.key.plain_title
    }

    pub fn title_html(&self) -> String {
        render(&self.entry.title, RenderOptions::inline())
    }

    pub fn short_answer_html(&self) -> String {
        render(&self.entry.short_answer, RenderOptions::inline())
    }

    pub fn sections(&self) -> &'a [DetailSection] {
        &self.entry.detail_section
    }
}

pub struct SearchResults<'a> {
    pub query: String,
    pub hits: Vec<EntryRef<'a>>,
}

impl<'a> SearchResults<'a> {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Message shown when nothing matched.
    pub fn empty_message(&self) -> String {
        format!(
            "No encontramos resultados para “{}”. Intenta con otro término.",
            self.query
        )
    }
}
