//! Vocabulary: the words a user has looked up
//!
//! Ordered most-recent-first and unique by case-insensitive `word`. Saving a
//! word that already exists updates that entry where it stands.

pub mod store;

pub use store::*;

use serde::{Deserialize, Serialize};

use crate::annotate::TermEntry;
use crate::lookup::LookupResult;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub word: String,
    pub translation: String,
    #[serde(default)]
    pub phonetic: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub explanation: String,
    /// Last save time in epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl VocabularyEntry {
    pub fn new(word: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            translation: translation.into(),
            phonetic: String::new(),
            context: String::new(),
            explanation: String::new(),
            timestamp: now_millis(),
        }
    }

    /// Entry for a finished lookup
    pub fn from_lookup(result: &LookupResult, context: &str) -> Self {
        Self {
            word: result.word.trim().to_string(),
            translation: result.translation.clone(),
            phonetic: result.phonetic.clone(),
            context: context.to_string(),
            explanation: result.explanation.clone(),
            timestamp: now_millis(),
        }
    }

    fn key(&self) -> String {
        self.word.trim().to_lowercase()
    }

    /// Hover text for the persistent marker
    pub fn tooltip(&self) -> String {
        [self.phonetic.trim(), self.explanation.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" · ")
    }

    pub fn to_term_entry(&self) -> TermEntry {
        TermEntry::new(self.word.trim(), self.translation.clone()).with_tooltip(self.tooltip())
    }
}

/// Result of [`Vocabulary::save_translation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
}

/// Ordered, duplicate-free vocabulary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored entries, keeping the first of any duplicates
    pub fn from_entries(entries: Vec<VocabularyEntry>) -> Self {
        let mut vocab = Self::new();
        for entry in entries {
            if !entry.word.trim().is_empty() && vocab.position(&entry.word).is_none() {
                vocab.entries.push(entry);
            }
        }
        vocab
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &VocabularyEntry> {
        self.entries.iter()
    }

    fn position(&self, word: &str) -> Option<usize> {
        let key = word.trim().to_lowercase();
        self.entries.iter().position(|e| e.key() == key)
    }

    pub fn find(&self, word: &str) -> Option<&VocabularyEntry> {
        self.position(word).map(|i| &self.entries[i])
    }

    pub fn contains(&self, word: &str) -> bool {
        self.position(word).is_some()
    }

    /// Insert `entry` at the front, or update the existing entry in place
    pub fn save_translation(&mut self, mut entry: VocabularyEntry) -> SaveOutcome {
        entry.timestamp = now_millis().max(entry.timestamp);
        match self.position(&entry.word) {
            Some(i) => {
                let existing = &mut self.entries[i];
                existing.translation = entry.translation;
                existing.phonetic = entry.phonetic;
                existing.context = entry.context;
                existing.explanation = entry.explanation;
                existing.timestamp = entry.timestamp;
                SaveOutcome::Updated
            }
            None => {
                self.entries.insert(0, entry);
                SaveOutcome::Inserted
            }
        }
    }

    pub fn remove_word(&mut self, word: &str) -> bool {
        match self.position(word) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Scan dictionary in vocabulary order
    pub fn term_entries(&self) -> Vec<TermEntry> {
        self.entries
            .iter()
            .filter(|e| !e.word.trim().is_empty())
            .map(VocabularyEntry::to_term_entry)
            .collect()
    }
}
