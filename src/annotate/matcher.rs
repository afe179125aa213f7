//! TermMatcher: whole-word, case-insensitive term matching
//!
//! Each term is escaped and compiled into its own boundary-anchored regex.
//! An Aho-Corasick automaton over the lower-cased terms picks which of those
//! regexes are worth running on a given text.
//!
//! # Overlaps
//! Different terms can match overlapping spans ("New York" and "York").
//! The longest match wins; ties go to the earliest start, then to the
//! earlier dictionary entry. Returned matches never overlap.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::bubble::TermEntry;

// =============================================================================
// Types
// =============================================================================

/// One occurrence of a term inside a text node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermMatch {
    /// The dictionary term that matched
    pub term: String,
    /// Index into the matcher's entries
    pub entry: usize,
    /// Byte offsets into the scanned text
    pub start: usize,
    pub end: usize,
    /// The text as it appears in the document
    pub matched_text: String,
}

impl TermMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &TermMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// =============================================================================
// Pattern construction
// =============================================================================

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Escaped, boundary-anchored pattern for a raw term
///
/// `\b` is only placed on an edge that starts or ends with a word character;
/// a boundary next to `+` in `C++` could never match.
pub fn term_pattern(term: &str) -> String {
    let term = term.trim();
    let escaped = regex::escape(term);
    let lead = term.chars().next().map(is_word_char).unwrap_or(false);
    let trail = term.chars().last().map(is_word_char).unwrap_or(false);
    format!(
        "{}{}{}",
        if lead { r"\b" } else { "" },
        escaped,
        if trail { r"\b" } else { "" }
    )
}

// =============================================================================
// TermMatcher
// =============================================================================

/// Compiled dictionary, rebuilt for every scan
pub struct TermMatcher {
    entries: Vec<TermEntry>,
    patterns: Vec<Regex>,
    prefilter: Option<AhoCorasick>,
}

impl TermMatcher {
    /// Compile a dictionary. Blank terms are skipped and duplicate terms
    /// (case-insensitive) keep their first occurrence.
    pub fn new(entries: &[TermEntry]) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut patterns = Vec::new();
        let mut needles = Vec::new();

        for entry in entries {
            let term = entry.term.trim();
            if term.is_empty() {
                continue;
            }
            let key = term.to_lowercase();
            if !seen.insert(key.clone()) {
                continue;
            }
            let regex = match RegexBuilder::new(&term_pattern(term)).case_insensitive(true).build() {
                Ok(r) => r,
                Err(e) => {
                    console_warn!("[TermMatcher] Skipping term {:?}: {}", term, e);
                    continue;
                }
            };
            kept.push(entry.clone());
            patterns.push(regex);
            needles.push(key);
        }

        let prefilter = if needles.is_empty() {
            None
        } else {
            AhoCorasickBuilder::new()
                .match_kind(MatchKind::Standard)
                .build(&needles)
                .map_err(|e| console_warn!("[TermMatcher] Prefilter disabled: {}", e))
                .ok()
        };

        Self {
            entries: kept,
            patterns,
            prefilter,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TermEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&TermEntry> {
        self.entries.get(index)
    }

    /// Indices of terms that might occur in `text`
    fn candidates(&self, text: &str) -> BTreeSet<usize> {
        match &self.prefilter {
            Some(ac) => {
                let lowered = text.to_lowercase();
                ac.find_overlapping_iter(&lowered)
                    .map(|m| m.pattern().as_usize())
                    .collect()
            }
            None => (0..self.patterns.len()).collect(),
        }
    }

    /// Every whole-word occurrence of every term, before overlap resolution
    pub fn find_all(&self, text: &str) -> Vec<TermMatch> {
        let mut out = Vec::new();
        for idx in self.candidates(text) {
            for m in self.patterns[idx].find_iter(text) {
                if m.start() == m.end() {
                    continue;
                }
                out.push(TermMatch {
                    term: self.entries[idx].term.clone(),
                    entry: idx,
                    start: m.start(),
                    end: m.end(),
                    matched_text: m.as_str().to_string(),
                });
            }
        }
        out
    }

    /// Non-overlapping matches ordered by start offset
    pub fn find_matches(&self, text: &str) -> Vec<TermMatch> {
        resolve_overlaps(self.find_all(text))
    }
}

/// Longest-match-wins selection of a non-overlapping subset
pub fn resolve_overlaps(mut matches: Vec<TermMatch>) -> Vec<TermMatch> {
    matches.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then(a.start.cmp(&b.start))
            .then(a.entry.cmp(&b.entry))
    });
    let mut accepted: Vec<TermMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        if !accepted.iter().any(|a| a.overlaps(&m)) {
            accepted.push(m);
        }
    }
    accepted.sort_by_key(|m| m.start);
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(terms: &[&str]) -> TermMatcher {
        let entries: Vec<TermEntry> = terms.iter().map(|t| TermEntry::new(*t, "")).collect();
        TermMatcher::new(&entries)
    }

    fn spans(matches: &[TermMatch]) -> Vec<(usize, usize, &str)> {
        matches.iter().map(|m| (m.start, m.end, m.matched_text.as_str())).collect()
    }

    #[test]
    fn test_term_pattern_escapes_metacharacters() {
        assert_eq!(term_pattern("a.b"), r"\ba\.b\b");
        assert_eq!(term_pattern("C++"), r"\bC\+\+");
        assert_eq!(term_pattern(".NET"), r"\.NET\b");
        assert_eq!(term_pattern("  cat "), r"\bcat\b");
    }

    #[test]
    fn test_whole_word_case_insensitive() {
        let m = matcher(&["cat"]);
        let found = m.find_matches("Cat, concat, CAT and category cat.");
        assert_eq!(spans(&found), vec![(0, 3, "Cat"), (13, 16, "CAT"), (30, 33, "cat")]);
    }

    #[test]
    fn test_metacharacters_match_literally() {
        let m = matcher(&["a.b", "C++"]);
        assert!(m.find_matches("axb").is_empty());
        let found = m.find_matches("use a.b with C++ today");
        assert_eq!(spans(&found), vec![(4, 7, "a.b"), (13, 16, "C++")]);
    }

    #[test]
    fn test_longest_match_wins() {
        let m = matcher(&["York", "New York", "New"]);
        let found = m.find_matches("I moved to New York last year");
        assert_eq!(spans(&found), vec![(11, 19, "New York")]);
        assert_eq!(found[0].term, "New York");
    }

    #[test]
    fn test_equal_length_overlap_prefers_earliest() {
        let m = matcher(&["b c", "a b"]);
        let found = m.find_matches("a b c");
        assert_eq!(spans(&found), vec![(0, 3, "a b")]);
    }

    #[test]
    fn test_duplicate_and_blank_terms_are_dropped() {
        let entries = vec![
            TermEntry::new("Cat", "first"),
            TermEntry::new("cat", "second"),
            TermEntry::new("   ", "blank"),
        ];
        let m = TermMatcher::new(&entries);
        assert_eq!(m.len(), 1);
        assert_eq!(m.entry(0).unwrap().rendered_label, "first");
    }

    #[test]
    fn test_unicode_terms() {
        let m = matcher(&["café", "Über"]);
        let found = m.find_matches("Ein CAFÉ über alles");
        assert_eq!(spans(&found), vec![(4, 9, "CAFÉ"), (10, 15, "über")]);
    }

    #[test]
    fn test_empty_dictionary() {
        let m = matcher(&[]);
        assert!(m.is_empty());
        assert!(m.find_matches("anything").is_empty());
    }
}
