//! Error kinds surfaced by the annotator.
//!
//! Every failure is recovered at the component boundary: lookup failures turn
//! into an inline bubble state, DOM failures into a fallback insertion point.

use crate::dom::DomError;

/// Errors produced while resolving a lookup or mutating the document
#[derive(Debug, Clone, PartialEq)]
pub enum BubbleError {
    /// No lookup credential is configured
    MissingCredential,
    /// The remote lookup failed (network or service error)
    TransportFailure(String),
    /// The remote payload did not have the expected structure
    MalformedResult(String),
    /// An insertion point could not be resolved
    DomMutationFailure(String),
    /// The key-value store rejected a read or write
    Storage(String),
}

impl BubbleError {
    /// Inline message shown inside an ephemeral bubble
    pub fn user_message(&self) -> String {
        match self {
            BubbleError::MissingCredential => {
                "No API key configured. Open the extension settings to add one.".to_string()
            }
            BubbleError::TransportFailure(_) => "Translation failed. Please try again.".to_string(),
            BubbleError::MalformedResult(_) => "Unexpected translation result.".to_string(),
            BubbleError::DomMutationFailure(_) => "Could not place the bubble.".to_string(),
            BubbleError::Storage(_) => "Could not save to the vocabulary.".to_string(),
        }
    }
}

impl std::fmt::Display for BubbleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BubbleError::MissingCredential => write!(f, "Missing lookup credential"),
            BubbleError::TransportFailure(msg) => write!(f, "Transport failure: {}", msg),
            BubbleError::MalformedResult(msg) => write!(f, "Malformed result: {}", msg),
            BubbleError::DomMutationFailure(msg) => write!(f, "DOM mutation failure: {}", msg),
            BubbleError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for BubbleError {}

impl From<DomError> for BubbleError {
    fn from(e: DomError) -> Self {
        BubbleError::DomMutationFailure(e.to_string())
    }
}
