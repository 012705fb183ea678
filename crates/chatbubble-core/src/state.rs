//! UI-agnostic widget state types
//!
//! These structures are shared between hosts (the HTML renderer, the terminal
//! front-end) and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};

use crate::guard::RequestGuard;

/// A cited reference returned alongside an assistant response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// Stable identity of a transcript entry, used by the renderer to diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

/// What kind of entry this is, which decides how it is styled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// The static welcome message the transcript is seeded with
    Greeting,
    User,
    Assistant,
    Error,
    /// Transient placeholder shown while a request is in flight
    Typing,
}

/// A single transcript entry.
///
/// `content` is always the raw text; escaping and formatting happen at render
/// time so that every host applies the same rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

/// Ordered, append-only list of chat entries.
///
/// The only entry that is ever removed is the typing indicator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transcript with one greeting entry
    pub fn with_greeting(greeting: &str) -> Self {
        let mut transcript = Self::new();
        transcript.push(EntryKind::Greeting, greeting.to_string(), Vec::new());
        transcript
    }

    pub fn push(&mut self, kind: EntryKind, content: String, sources: Vec<Source>) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            kind,
            content,
            sources,
        });
        id
    }

    pub fn push_typing(&mut self) -> EntryId {
        self.push(EntryKind::Typing, String::new(), Vec::new())
    }

    /// Remove the typing indicator if one is present. Returns whether anything was removed.
    pub fn remove_typing(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.kind != EntryKind::Typing);
        self.entries.len() != before
    }

    pub fn has_typing(&self) -> bool {
        self.entries.iter().any(|e| e.kind == EntryKind::Typing)
    }

    /// Drop everything after the greeting. Entry ids keep increasing so a
    /// renderer never confuses a new entry with a removed one.
    pub fn reset_to_greeting(&mut self) {
        self.entries.retain(|e| e.kind == EntryKind::Greeting);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }
}

/// Whether the panel or the toggle bubble is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// Toggle visible, panel hidden
    #[default]
    Closed,
    /// Toggle hidden, panel visible, input focused
    Open,
}

/// Everything the widget needs to draw itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetState {
    pub visibility: Visibility,
    pub transcript: Transcript,
    pub guard: RequestGuard,
    pub input: String,
    /// Bumped every time the transcript should be scrolled to the bottom
    pub scroll_generation: u64,
}

impl WidgetState {
    pub fn new(greeting: &str) -> Self {
        Self {
            visibility: Visibility::Closed,
            transcript: Transcript::with_greeting(greeting),
            guard: RequestGuard::new(),
            input: String::new(),
            scroll_generation: 0,
        }
    }

    /// Input and send control are disabled while a request is outstanding
    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    pub fn is_open(&self) -> bool {
        self.visibility == Visibility::Open
    }

    pub(crate) fn scroll_to_bottom(&mut self) {
        self.scroll_generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_seeds_transcript() {
        let t = Transcript::with_greeting("Hello!");
        assert_eq!(t.len(), 1);
        assert_eq!(t.entries()[0].kind, EntryKind::Greeting);
        assert_eq!(t.entries()[0].content, "Hello!");
    }

    #[test]
    fn test_ids_are_monotonic_across_removal() {
        let mut t = Transcript::with_greeting("hi");
        let typing = t.push_typing();
        assert!(t.remove_typing());
        let next = t.push(EntryKind::User, "x".into(), Vec::new());
        assert!(next > typing);
    }

    #[test]
    fn test_remove_typing_when_absent() {
        let mut t = Transcript::with_greeting("hi");
        assert!(!t.remove_typing());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_reset_keeps_only_greeting() {
        let mut t = Transcript::with_greeting("hi");
        t.push(EntryKind::User, "a".into(), Vec::new());
        t.push(EntryKind::Assistant, "b".into(), Vec::new());
        t.reset_to_greeting();
        assert_eq!(t.len(), 1);
        assert_eq!(t.entries()[0].kind, EntryKind::Greeting);
    }

    #[test]
    fn test_new_state_is_closed_and_idle() {
        let state = WidgetState::new("hi");
        assert_eq!(state.visibility, Visibility::Closed);
        assert!(!state.is_busy());
        assert!(state.input.is_empty());
    }
}
