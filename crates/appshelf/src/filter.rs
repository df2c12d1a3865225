//! Search filtering over the item set.
//!
//! A [`SearchPattern`] is the lowercased text the user typed. An item matches
//! when its resolved display name contains the pattern, compared
//! case-insensitively. An empty pattern matches everything.
//!
//! The filter only ever reads names that are already cached: it never waits
//! for or triggers resolution, so match quality improves as the name cache
//! warms up.
//!
//! # Example
//!
//! ```
//! use appshelf::filter::{highlight_spans, matches, SearchPattern};
//!
//! let pattern = SearchPattern::new("AL");
//! assert_eq!(pattern.as_str(), "al");
//! assert!(matches(Some("Alpha"), &pattern));
//! assert!(!matches(None, &pattern));
//!
//! assert_eq!(highlight_spans("Alpha Gala", &pattern), vec![0..2, 7..9]);
//! ```

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::cache::AttributeCache;
use crate::item::Item;

/// The current lowercase filter text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SearchPattern(String);

impl SearchPattern {
    /// Create a pattern from user input, lowercasing it.
    pub fn new(text: &str) -> Self {
        Self(fold_case(text))
    }

    /// Whether this pattern matches everything.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The lowercased pattern text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase one character at a time.
///
/// Unlike [`str::to_lowercase`] this ignores context (a word-final 'Σ' folds
/// to 'σ' like any other), so every character's folded form can be traced
/// back to its source range.
fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Test a display name against a pattern.
///
/// An empty pattern matches everything, including unknown names. Otherwise
/// an unknown name never matches.
pub fn matches(name: Option<&str>, pattern: &SearchPattern) -> bool {
    if pattern.is_empty() {
        return true;
    }
    name.is_some_and(|name| fold_case(name).contains(pattern.as_str()))
}

/// Recompute the view for `pattern` over the full item set.
///
/// Returns the positions of matching items in registration order. Names are
/// read with [`AttributeCache::peek`] so a full scan does not disturb cache
/// recency.
pub fn filter_view<T: Item>(
    items: &[Arc<T>],
    names: &AttributeCache<String, String>,
    pattern: &SearchPattern,
) -> Vec<usize> {
    if pattern.is_empty() {
        return (0..items.len()).collect();
    }
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| matches(names.peek(item.key()).as_deref(), pattern))
        .map(|(position, _)| position)
        .collect()
}

/// Byte ranges of `text` covered by case-insensitive, non-overlapping
/// occurrences of `pattern`, in order.
///
/// Ranges always fall on character boundaries of `text`, even when
/// lowercasing changes the byte length of a character.
pub fn highlight_spans(text: &str, pattern: &SearchPattern) -> Vec<Range<usize>> {
    if pattern.is_empty() {
        return Vec::new();
    }

    // `fold_case`, keeping for every source character where its lowercase
    // form starts in `lowered` and the source range it came from.
    let mut lowered = String::with_capacity(text.len());
    let mut origins: Vec<(usize, Range<usize>)> = Vec::with_capacity(text.len());
    for (start, ch) in text.char_indices() {
        origins.push((lowered.len(), start..start + ch.len_utf8()));
        lowered.extend(ch.to_lowercase());
    }

    let source_char = |lowered_offset: usize| {
        let index = origins.partition_point(|(begin, _)| *begin <= lowered_offset);
        origins[index.saturating_sub(1)].1.clone()
    };

    let mut spans: Vec<Range<usize>> = Vec::new();
    for (start, found) in lowered.match_indices(pattern.as_str()) {
        let begin = source_char(start).start;
        let end = source_char(start + found.len() - 1).end;
        match spans.last_mut() {
            // Two matches inside one multi-byte expansion collapse together.
            Some(last) if last.end > begin => last.end = last.end.max(end),
            _ => spans.push(begin..end),
        }
    }
    spans
}
