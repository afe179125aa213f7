//! Persistence over an opaque key-value store
//!
//! Two keys are used: `vocabulary` (a JSON array of entries) and `settings`
//! (`{ "api_key": ... }`). The store itself is a collaborator; [`MemoryStore`]
//! backs tests and native hosts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{SaveOutcome, Vocabulary, VocabularyEntry};
use crate::error::BubbleError;

pub const VOCABULARY_KEY: &str = "vocabulary";
pub const SETTINGS_KEY: &str = "settings";

/// Asynchronous key-value persistence
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, BubbleError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), BubbleError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RefCell<HashMap<String, Value>>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.data.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, BubbleError> {
        Ok(self.data.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), BubbleError> {
        self.data.borrow_mut().insert(key.to_string(), value);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// User settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Settings {
    /// The lookup credential, if a non-blank one is configured
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Typed access to vocabulary and settings
pub struct VocabularyStore<S> {
    store: S,
}

impl<S: KeyValueStore> VocabularyStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub async fn load_vocabulary(&self) -> Result<Vocabulary, BubbleError> {
        match self.store.get(VOCABULARY_KEY).await? {
            None | Some(Value::Null) => Ok(Vocabulary::new()),
            Some(value) => serde_json::from_value::<Vec<VocabularyEntry>>(value)
                .map(Vocabulary::from_entries)
                .map_err(|e| BubbleError::Storage(format!("Invalid vocabulary: {}", e))),
        }
    }

    pub async fn save_vocabulary(&self, vocabulary: &Vocabulary) -> Result<(), BubbleError> {
        let value = serde_json::to_value(vocabulary).map_err(|e| BubbleError::Storage(e.to_string()))?;
        self.store.set(VOCABULARY_KEY, value).await
    }

    pub async fn load_settings(&self) -> Result<Settings, BubbleError> {
        match self.store.get(SETTINGS_KEY).await? {
            None | Some(Value::Null) => Ok(Settings::default()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| BubbleError::Storage(format!("Invalid settings: {}", e))),
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<(), BubbleError> {
        let value = serde_json::to_value(settings).map_err(|e| BubbleError::Storage(e.to_string()))?;
        self.store.set(SETTINGS_KEY, value).await
    }

    /// Upsert one entry; returns the vocabulary as written
    pub async fn save_translation(&self, entry: VocabularyEntry) -> Result<(Vocabulary, SaveOutcome), BubbleError> {
        let mut vocabulary = self.load_vocabulary().await?;
        let outcome = vocabulary.save_translation(entry);
        self.save_vocabulary(&vocabulary).await?;
        Ok((vocabulary, outcome))
    }

    pub async fn remove_word(&self, word: &str) -> Result<bool, BubbleError> {
        let mut vocabulary = self.load_vocabulary().await?;
        if !vocabulary.remove_word(word) {
            return Ok(false);
        }
        self.save_vocabulary(&vocabulary).await?;
        Ok(true)
    }

    pub async fn clear(&self) -> Result<(), BubbleError> {
        self.save_vocabulary(&Vocabulary::new()).await
    }
}
