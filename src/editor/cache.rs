use std::collections::HashMap;

/// The last `max_chars` chars of `text`. Never splits a multi-byte char.
pub(crate) fn snippet_of(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

/// Suggestions already returned in this session, keyed by snippet.
///
/// The title is not part of the key, so two notes that end the same way
/// share an entry. Lives as long as the editing screen; no eviction.
#[derive(Debug, Default)]
pub(crate) struct SuggestionCache {
    entries: HashMap<String, String>,
}

impl SuggestionCache {
    pub fn get(&self, snippet: &str) -> Option<&str> {
        self.entries.get(snippet).map(String::as_str)
    }

    pub fn put(&mut self, snippet: impl Into<String>, suggestion: impl Into<String>) {
        self.entries.insert(snippet.into(), suggestion.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
