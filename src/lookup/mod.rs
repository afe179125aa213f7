//! Lookup collaborator contract
//!
//! The core never talks to a translation backend itself. It builds a
//! [`LookupRequest`], hands it to a [`LookupService`] and parses whatever text
//! comes back into a [`LookupResult`], degrading instead of failing when the
//! payload is malformed.

pub mod context;
pub mod parse;

pub use context::*;
pub use parse::*;

use serde::{Deserialize, Serialize};

use crate::annotate::BubbleContent;
use crate::error::BubbleError;

/// What gets looked up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRequest {
    /// The selected text
    pub text: String,
    /// Sentence around the selection
    #[serde(default)]
    pub context: String,
}

impl LookupRequest {
    pub fn new(text: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: context.into(),
        }
    }
}

/// A parsed lookup answer; missing fields are empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub phonetic: String,
    #[serde(default)]
    pub explanation: String,
}

impl LookupResult {
    /// The resolved bubble state for this answer
    pub fn to_content(&self) -> BubbleContent {
        BubbleContent::Resolved {
            translation: self.translation.clone(),
            phonetic: self.phonetic.clone(),
            explanation: self.explanation.clone(),
        }
    }
}

/// Remote lookup, e.g. an HTTP call to a completion service
///
/// Returns the raw response text. No retries are expected.
#[allow(async_fn_in_trait)]
pub trait LookupService {
    async fn lookup(&self, request: &LookupRequest, credential: &str) -> Result<String, BubbleError>;
}
