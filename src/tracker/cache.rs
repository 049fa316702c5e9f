//! Bounded, deduplicating store of recently added code fragments.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Default number of fragments kept per file.
pub const DEFAULT_CACHE_SIZE: usize = 5;

/// A unit of newly added text. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFragment {
    text: String,
    added_at: DateTime<Utc>,
}

impl ChangeFragment {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }
}

/// FIFO cache of fragments, oldest first.
///
/// Invariants: no two fragments share the same trimmed text, blank fragments
/// are never stored, and the length never exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct ChangeCache {
    capacity: usize,
    fragments: VecDeque<ChangeFragment>,
}

impl ChangeCache {
    /// Create an empty cache. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            fragments: VecDeque::with_capacity(capacity),
        }
    }

    /// Insert a fragment, evicting the oldest one when over capacity.
    ///
    /// Returns `true` if the fragment was stored.
    pub fn add(&mut self, fragment: &str) -> bool {
        let text = fragment.trim();
        if text.is_empty() || self.contains(text) {
            return false;
        }

        self.fragments.push_back(ChangeFragment {
            text: text.to_string(),
            added_at: Utc::now(),
        });
        while self.fragments.len() > self.capacity {
            self.fragments.pop_front();
        }
        true
    }

    /// Drop every fragment that no longer appears verbatim in `current_content`.
    ///
    /// Returns the number of fragments removed.
    pub fn remove_deleted(&mut self, current_content: &str) -> usize {
        let before = self.fragments.len();
        self.fragments
            .retain(|fragment| current_content.contains(fragment.text.as_str()));
        before - self.fragments.len()
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, text: &str) -> bool {
        let text = text.trim();
        self.fragments.iter().any(|f| f.text == text)
    }

    pub fn fragments(&self) -> impl Iterator<Item = &ChangeFragment> {
        self.fragments.iter()
    }

    /// All fragment texts, oldest first, separated by a blank line.
    pub fn context(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for ChangeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(cache: &ChangeCache) -> Vec<&str> {
        cache.fragments().map(|f| f.text()).collect()
    }

    #[test]
    fn test_add_single_fragment() {
        let mut cache = ChangeCache::new(3);
        assert!(cache.add("c"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.context(), "c");
    }

    #[test]
    fn test_add_is_idempotent_after_trim() {
        let mut cache = ChangeCache::new(3);
        assert!(cache.add("let x = 1;"));
        assert!(!cache.add("  let x = 1;\n"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_blank_fragments_are_ignored() {
        let mut cache = ChangeCache::new(3);
        assert!(!cache.add(""));
        assert!(!cache.add("   \n\t"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_is_fifo() {
        let mut cache = ChangeCache::new(2);
        cache.add("x");
        cache.add("y");
        cache.add("z");
        assert_eq!(texts(&cache), vec!["y", "z"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_duplicate_does_not_refresh_position() {
        let mut cache = ChangeCache::new(2);
        cache.add("x");
        cache.add("y");
        cache.add("x");
        cache.add("z");
        assert_eq!(texts(&cache), vec!["y", "z"]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut cache = ChangeCache::new(4);
        for i in 0..50 {
            cache.add(&format!("fragment {i}"));
            assert!(cache.len() <= 4);
        }
        assert_eq!(
            texts(&cache),
            vec!["fragment 46", "fragment 47", "fragment 48", "fragment 49"]
        );
    }

    #[test]
    fn test_remove_deleted_keeps_survivor_order() {
        let mut cache = ChangeCache::new(5);
        cache.add("alpha");
        cache.add("foo");
        cache.add("beta");
        cache.add("gamma");

        let removed = cache.remove_deleted("gamma\nalpha\nbeta\n");
        assert_eq!(removed, 1);
        assert_eq!(texts(&cache), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_remove_deleted_last_fragment_empties_cache() {
        let mut cache = ChangeCache::new(3);
        cache.add("foo");
        cache.remove_deleted("bar\nbaz\n");
        assert!(!cache.contains("foo"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_deleted_matches_multiline_fragment_verbatim() {
        let mut cache = ChangeCache::new(3);
        cache.add("if ok {\nrun();");
        assert_eq!(cache.remove_deleted("if ok {\nrun();\n}"), 0);
        assert_eq!(cache.remove_deleted("if ok {\n    run();\n}"), 1);
    }

    #[test]
    fn test_clear_empties_cache() {
        let mut cache = ChangeCache::new(3);
        cache.add("a");
        cache.add("b");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.context(), "");
    }

    #[test]
    fn test_context_joins_with_blank_line() {
        let mut cache = ChangeCache::new(3);
        cache.add("first");
        cache.add("second\nline");
        assert_eq!(cache.context(), "first\n\nsecond\nline");
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut cache = ChangeCache::new(0);
        cache.add("a");
        cache.add("b");
        assert_eq!(cache.capacity(), 1);
        assert_eq!(texts(&cache), vec!["b"]);
    }

    #[test]
    fn test_fragments_carry_timestamp() {
        let before = Utc::now();
        let mut cache = ChangeCache::new(3);
        cache.add("a");
        let fragment = cache.fragments().next().unwrap();
        assert!(fragment.added_at() >= before);
    }
}
