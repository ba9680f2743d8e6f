//! Expand/collapse state of the FAQ page and its URL-fragment deep links.
//!
//! The page keeps a [`PageState`]; every user event or page load is an
//! [`Action`], and [`reduce`] returns the next state plus the [`Effect`]s the
//! host (browser shim, server redirect) has to carry out. Reductions never
//! mutate their input.

use crate::anchor::{decode_fragment, sanitize_fragment};
use crate::{EntryRef, FaqStore};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageState {
    /// Identifiers of the expanded entries.
    pub open_items: BTreeSet<String>,
    pub search_term: String,
    /// Mirror of the URL fragment, without `#`.
    pub fragment: Option<String>,
}

impl PageState {
    pub fn is_open(&self, id: &str) -> bool {
        self.open_items.contains(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Search(String),
    Toggle { id: String, anchor: String },
    /// Initial page load with the raw URL fragment, if any.
    Mount { fragment: Option<String> },
}

impl Action {
    pub fn toggle(entry: &EntryRef<'_>) -> Self {
        Action::Toggle {
            id: entry.id().to_string(),
            anchor: entry.anchor().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Rewrite the URL fragment in place (no history entry). `None` clears it.
    ReplaceFragment(Option<String>),
    /// Scroll the element with this id into view on the next frame.
    ScrollIntoView(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: PageState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn quiet(state: PageState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

pub fn reduce(store: &FaqStore, state: &PageState, action: Action) -> Transition {
    let mut next = state.clone();
    match action {
        Action::Search(term) => {
            next.search_term = term;
            Transition::quiet(next)
        }
        Action::Toggle { id, anchor } => toggle(next, id, &anchor),
        Action::Mount { fragment } => mount(store, next, fragment.as_deref()),
    }
}

fn toggle(mut state: PageState, id: String, anchor: &str) -> Transition {
    let anchor = sanitize_fragment(anchor);
    let mut effects = Vec::new();
    if state.open_items.remove(&id) {
        if !anchor.is_empty() && state.fragment.as_deref() == Some(anchor) {
            state.fragment = None;
            effects.push(Effect::ReplaceFragment(None));
        }
    } else {
        state.open_items.insert(id);
        if !anchor.is_empty() {
            state.fragment = Some(anchor.to_string());
            effects.push(Effect::ReplaceFragment(Some(anchor.to_string())));
            effects.push(Effect::ScrollIntoView(anchor.to_string()));
        }
    }
    Transition { state, effects }
}

fn mount(store: &FaqStore, mut state: PageState, raw: Option<&str>) -> Transition {
    let decoded = decode_fragment(raw.unwrap_or_default());
    let hash = sanitize_fragment(&decoded);
    if hash.is_empty() {
        return Transition::quiet(state);
    }
    state.fragment = Some(hash.to_string());
    let Some(entry) = store.by_anchor(hash) else {
        debug!(fragment = hash, "no entry matches the URL fragment");
        return Transition::quiet(state);
    };
    state.open_items.insert(entry.id().to_string());
    Transition {
        state,
        effects: vec![Effect::ScrollIntoView(hash.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FaqEntry;

    fn store() -> FaqStore {
        let entries = ["A", "B", "¿Qué es Shield?"]
            .into_iter()
            .map(|title| FaqEntry {
                title: title.to_string(),
                short_answer: String::new(),
                ..FaqEntry::default()
            })
            .collect();
        FaqStore::new(entries).unwrap()
    }

    fn toggle_title(store: &FaqStore, state: &PageState, title: &str) -> Transition {
        let entry = store.iter().find(|e| e.entry().title == title).unwrap();
        reduce(store, state, Action::toggle(&entry))
    }

    #[test]
    fn opening_sets_fragment_and_scrolls() {
        let store = store();
        let opened = toggle_title(&store, &PageState::default(), "A");
        assert!(opened.state.is_open("A"));
        assert_eq!(opened.state.fragment.as_deref(), Some("faq-a"));
        assert_eq!(
            opened.effects,
            vec![
                Effect::ReplaceFragment(Some("faq-a".to_string())),
                Effect::ScrollIntoView("faq-a".to_string()),
            ]
        );
    }

    #[test]
    fn closing_current_entry_clears_fragment() {
        let store = store();
        let opened = toggle_title(&store, &PageState::default(), "A");
        let closed = toggle_title(&store, &opened.state, "A");
        assert!(!closed.state.is_open("A"));
        assert_eq!(closed.state.fragment, None);
        assert_eq!(closed.effects, vec![Effect::ReplaceFragment(None)]);
    }

    #[test]
    fn closing_other_entry_keeps_fragment() {
        let store = store();
        let a = toggle_title(&store, &PageState::default(), "A");
        let b = toggle_title(&store, &a.state, "B");
        let closed_a = toggle_title(&store, &b.state, "A");
        assert!(closed_a.state.is_open("B"));
        assert_eq!(closed_a.state.fragment.as_deref(), Some("faq-b"));
        assert!(closed_a.effects.is_empty());
    }

    #[test]
    fn reduce_leaves_input_untouched() {
        let store = store();
        let before = PageState::default();
        let _ = toggle_title(&store, &before, "A");
        assert_eq!(before, PageState::default());
    }

    #[test]
    fn search_only_updates_term() {
        let store = store();
        let next = reduce(&store, &PageState::default(), Action::Search("shield".into()));
        assert_eq!(next.state.search_term, "shield");
        assert!(next.effects.is_empty());
    }

    #[test]
    fn deep_link_round_trip() {
        let store = store();
        let opened = toggle_title(&store, &PageState::default(), "¿Qué es Shield?");
        let fragment = opened.state.fragment.clone().unwrap();
        assert!(
            fragment
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        );

        let reloaded = reduce(
            &store,
            &PageState::default(),
            Action::Mount {
                fragment: Some(format!("#{fragment}")),
            },
        );
        assert!(reloaded.state.is_open("¿Qué es Shield?"));
        assert_eq!(reloaded.effects, vec![Effect::ScrollIntoView(fragment)]);
    }

    #[test]
    fn mount_decodes_percent_escapes() {
        let store = store();
        let mounted = reduce(
            &store,
            &PageState::default(),
            Action::Mount {
                fragment: Some("%23faq-%62".to_string()),
            },
        );
        assert!(mounted.state.is_open("B"));
    }

    #[test]
    fn mount_without_match_is_a_no_op() {
        let store = store();
        for fragment in [None, Some(""), Some("#"), Some("#faq-zzz"), Some("%E0%A4%A")] {
            let mounted = reduce(
                &store,
                &PageState::default(),
                Action::Mount {
                    fragment: fragment.map(str::to_string),
                },
            );
            assert!(mounted.state.open_items.is_empty(), "{fragment:?}");
            assert!(mounted.effects.is_empty(), "{fragment:?}");
        }
    }
}
