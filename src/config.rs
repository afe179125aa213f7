//! Annotator configuration

use serde::{Deserialize, Serialize};

/// Configuration for the gesture resolver and annotation engine
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnnotatorConfig {
    /// Delay between the double-click and the confirming click becoming armed
    #[serde(default = "default_activation_delay_ms")]
    pub activation_delay_ms: u32,
    /// Minimum selection length in characters (inclusive)
    #[serde(default = "default_min_selection_chars")]
    pub min_selection_chars: usize,
    /// Maximum selection length in characters (exclusive)
    #[serde(default = "default_max_selection_chars")]
    pub max_selection_chars: usize,
    /// Minimum trimmed text-node length considered by a scan (inclusive)
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    /// Maximum trimmed text-node length considered by a scan (inclusive)
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    /// Parent tags whose text is never rewritten
    #[serde(default = "default_excluded_tags")]
    pub excluded_tags: Vec<String>,
    /// Class keywords marking UI chrome
    #[serde(default = "default_chrome_class_keywords")]
    pub chrome_class_keywords: Vec<String>,
    /// Cap on the context string sent with a lookup
    #[serde(default = "default_context_max_chars")]
    pub context_max_chars: usize,
    /// When false, rescans only clear persistent bubbles
    #[serde(default = "default_true")]
    pub auto_annotate: bool,
    /// Element tag used for bubble markers
    #[serde(default = "default_marker_tag")]
    pub marker_tag: String,
    /// Prefix for marker class names
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
}

fn default_true() -> bool { true }
fn default_activation_delay_ms() -> u32 { 200 }
fn default_min_selection_chars() -> usize { 1 }
fn default_max_selection_chars() -> usize { 50 }
fn default_min_text_chars() -> usize { 3 }
fn default_max_text_chars() -> usize { 500 }
fn default_context_max_chars() -> usize { 300 }
fn default_marker_tag() -> String { "span".to_string() }
fn default_class_prefix() -> String { "gloss".to_string() }

fn default_excluded_tags() -> Vec<String> {
    [
        "script", "style", "noscript", "iframe", "object", "embed",
        "textarea", "input", "select", "option", "canvas", "svg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_chrome_class_keywords() -> Vec<String> {
    ["button", "btn", "nav", "menu", "header", "footer", "toolbar"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            activation_delay_ms: default_activation_delay_ms(),
            min_selection_chars: default_min_selection_chars(),
            max_selection_chars: default_max_selection_chars(),
            min_text_chars: default_min_text_chars(),
            max_text_chars: default_max_text_chars(),
            excluded_tags: default_excluded_tags(),
            chrome_class_keywords: default_chrome_class_keywords(),
            context_max_chars: default_context_max_chars(),
            auto_annotate: true,
            marker_tag: default_marker_tag(),
            class_prefix: default_class_prefix(),
        }
    }
}

impl AnnotatorConfig {
    /// Parse a JSON config, filling every missing field with its default
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid config: {}", e))
    }

    /// Whether a selection of `chars` characters may start a gesture
    pub fn accepts_selection(&self, chars: usize) -> bool {
        chars >= self.min_selection_chars && chars < self.max_selection_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AnnotatorConfig::default();
        assert_eq!(config.activation_delay_ms, 200);
        assert_eq!(config.min_selection_chars, 1);
        assert_eq!(config.max_selection_chars, 50);
        assert_eq!(config.min_text_chars, 3);
        assert_eq!(config.max_text_chars, 500);
        assert!(config.excluded_tags.iter().any(|t| t == "script"));
        assert!(config.auto_annotate);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AnnotatorConfig::from_json(r#"{"activation_delay_ms": 350}"#).unwrap();
        assert_eq!(config.activation_delay_ms, 350);
        assert_eq!(config.max_selection_chars, 50);
        assert_eq!(config.marker_tag, "span");
    }

    #[test]
    fn test_invalid_json_reports_error() {
        let err = AnnotatorConfig::from_json(r#"{"activation_delay_ms": "soon"}"#).unwrap_err();
        assert!(err.starts_with("Invalid config"));
    }

    #[test]
    fn test_selection_bounds() {
        let config = AnnotatorConfig::default();
        assert!(!config.accepts_selection(0));
        assert!(config.accepts_selection(1));
        assert!(config.accepts_selection(49));
        assert!(!config.accepts_selection(50));
    }
}
