//! Bubble markers and the bubble registry
//!
//! Markers are plain elements tagged with `data-gloss-*` attributes so any
//! later pass (or another view of the same page) can recognise them.

use serde::{Deserialize, Serialize};

use crate::config::AnnotatorConfig;
use crate::dom::{DocumentTree, DomError};

pub const ATTR_KIND: &str = "data-gloss-kind";
pub const ATTR_ID: &str = "data-gloss-id";
pub const ATTR_TERM: &str = "data-gloss-term";
pub const ATTR_STATE: &str = "data-gloss-state";
pub const ATTR_HIGHLIGHT: &str = "data-gloss-highlight";

// =============================================================================
// Types
// =============================================================================

/// Process-unique bubble identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BubbleId(pub u64);

impl BubbleId {
    /// Parse the `data-gloss-id` attribute form
    pub fn parse(s: &str) -> Option<Self> {
        s.strip_prefix("bubble-")?.parse().ok().map(BubbleId)
    }
}

impl std::fmt::Display for BubbleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bubble-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BubbleKind {
    /// Tied to one user-initiated lookup
    Ephemeral,
    /// Marks a known vocabulary term; recreated on every scan
    Persistent,
    /// Transient phonetic hint shown while a gesture is ready
    Pronunciation,
}

impl BubbleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BubbleKind::Ephemeral => "ephemeral",
            BubbleKind::Persistent => "persistent",
            BubbleKind::Pronunciation => "pronunciation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ephemeral" => Some(BubbleKind::Ephemeral),
            "persistent" => Some(BubbleKind::Persistent),
            "pronunciation" => Some(BubbleKind::Pronunciation),
            _ => None,
        }
    }
}

/// What an ephemeral bubble currently shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BubbleContent {
    Loading,
    Resolved {
        translation: String,
        #[serde(default)]
        phonetic: String,
        #[serde(default)]
        explanation: String,
    },
    Failed { message: String },
}

impl BubbleContent {
    fn state_name(&self) -> &'static str {
        match self {
            BubbleContent::Loading => "loading",
            BubbleContent::Resolved { .. } => "resolved",
            BubbleContent::Failed { .. } => "failed",
        }
    }
}

/// One entry of the scan's match dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    pub rendered_label: String,
    #[serde(default)]
    pub tooltip: String,
}

impl TermEntry {
    pub fn new(term: impl Into<String>, rendered_label: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            rendered_label: rendered_label.into(),
            tooltip: String::new(),
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = tooltip.into();
        self
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Builds marker subtrees with the configured tag and class prefix
pub struct MarkerRenderer<'a> {
    tag: &'a str,
    prefix: &'a str,
}

impl<'a> MarkerRenderer<'a> {
    pub fn new(config: &'a AnnotatorConfig) -> Self {
        Self {
            tag: &config.marker_tag,
            prefix: &config.class_prefix,
        }
    }

    /// `<span kind=persistent>matched<span class=label>label</span></span>`
    pub fn persistent<T: DocumentTree>(
        &self,
        tree: &mut T,
        id: BubbleId,
        matched_text: &str,
        entry: &TermEntry,
    ) -> Result<T::Node, DomError> {
        let marker = self.shell(tree, id, BubbleKind::Persistent, &format!("{}-term", self.prefix))?;
        tree.set_attribute(&marker, ATTR_TERM, matched_text)?;
        if !entry.tooltip.is_empty() {
            tree.set_attribute(&marker, "title", &entry.tooltip)?;
        }
        let word = tree.create_text(matched_text)?;
        tree.append_child(&marker, &word)?;
        let label = self.labelled(tree, "label", &entry.rendered_label)?;
        tree.append_child(&marker, &label)?;
        Ok(marker)
    }

    pub fn ephemeral<T: DocumentTree>(
        &self,
        tree: &mut T,
        id: BubbleId,
        term: &str,
        content: &BubbleContent,
    ) -> Result<T::Node, DomError> {
        let marker = self.shell(tree, id, BubbleKind::Ephemeral, &format!("{}-bubble", self.prefix))?;
        tree.set_attribute(&marker, ATTR_TERM, term)?;
        self.fill(tree, &marker, content)?;
        Ok(marker)
    }

    /// Replace an ephemeral marker's content in place
    pub fn refill<T: DocumentTree>(
        &self,
        tree: &mut T,
        marker: &T::Node,
        content: &BubbleContent,
    ) -> Result<(), DomError> {
        for child in tree.children(marker) {
            tree.remove(&child)?;
        }
        self.fill(tree, marker, content)
    }

    pub fn pronunciation<T: DocumentTree>(
        &self,
        tree: &mut T,
        id: BubbleId,
        phonetic: &str,
    ) -> Result<T::Node, DomError> {
        let marker = self.shell(tree, id, BubbleKind::Pronunciation, &format!("{}-phonetic", self.prefix))?;
        let text = tree.create_text(phonetic)?;
        tree.append_child(&marker, &text)?;
        Ok(marker)
    }

    fn shell<T: DocumentTree>(
        &self,
        tree: &mut T,
        id: BubbleId,
        kind: BubbleKind,
        class: &str,
    ) -> Result<T::Node, DomError> {
        let marker = tree.create_element(self.tag)?;
        tree.set_attribute(&marker, "class", class)?;
        tree.set_attribute(&marker, ATTR_KIND, kind.as_str())?;
        tree.set_attribute(&marker, ATTR_ID, &id.to_string())?;
        Ok(marker)
    }

    fn labelled<T: DocumentTree>(&self, tree: &mut T, role: &str, text: &str) -> Result<T::Node, DomError> {
        let el = tree.create_element(self.tag)?;
        tree.set_attribute(&el, "class", &format!("{}-{}", self.prefix, role))?;
        let t = tree.create_text(text)?;
        tree.append_child(&el, &t)?;
        Ok(el)
    }

    fn fill<T: DocumentTree>(&self, tree: &mut T, marker: &T::Node, content: &BubbleContent) -> Result<(), DomError> {
        tree.set_attribute(marker, ATTR_STATE, content.state_name())?;
        match content {
            BubbleContent::Loading => {
                let el = self.labelled(tree, "loading", "…")?;
                tree.append_child(marker, &el)?;
            }
            BubbleContent::Resolved { translation, phonetic, explanation } => {
                let el = self.labelled(tree, "label", translation)?;
                tree.append_child(marker, &el)?;
                if !phonetic.is_empty() {
                    let el = self.labelled(tree, "phonetic", phonetic)?;
                    tree.append_child(marker, &el)?;
                }
                if !explanation.is_empty() {
                    tree.set_attribute(marker, "title", explanation)?;
                }
            }
            BubbleContent::Failed { message } => {
                let el = self.labelled(tree, "error", message)?;
                tree.append_child(marker, &el)?;
            }
        }
        Ok(())
    }
}

/// Kind of a node when it is a bubble marker
pub fn marker_kind<T: DocumentTree>(tree: &T, node: &T::Node) -> Option<BubbleKind> {
    if !tree.is_element(node) {
        return None;
    }
    tree.attribute(node, ATTR_KIND).and_then(|k| BubbleKind::parse(&k))
}

pub fn marker_id<T: DocumentTree>(tree: &T, node: &T::Node) -> Option<BubbleId> {
    tree.attribute(node, ATTR_ID).and_then(|s| BubbleId::parse(&s))
}

// =============================================================================
// Registry
// =============================================================================

/// A bubble currently inserted in the document
#[derive(Debug, Clone)]
pub struct BubbleRecord<N> {
    pub id: BubbleId,
    pub kind: BubbleKind,
    pub node: N,
    /// Selected or matched text the bubble annotates
    pub text: String,
    pub content: Option<BubbleContent>,
}

/// Owns bubble ids and the records of live bubbles
#[derive(Debug)]
pub struct BubbleRegistry<N> {
    next_id: u64,
    records: Vec<BubbleRecord<N>>,
}

impl<N> Default for BubbleRegistry<N> {
    fn default() -> Self {
        Self {
            next_id: 0,
            records: Vec::new(),
        }
    }
}

impl<N: Clone + PartialEq> BubbleRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> BubbleId {
        self.next_id += 1;
        BubbleId(self.next_id)
    }

    pub fn insert(&mut self, record: BubbleRecord<N>) {
        self.records.push(record);
    }

    pub fn get(&self, id: BubbleId) -> Option<&BubbleRecord<N>> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: BubbleId) -> Option<&mut BubbleRecord<N>> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn remove(&mut self, id: BubbleId) -> Option<BubbleRecord<N>> {
        let idx = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(idx))
    }

    pub fn ids(&self, kind: BubbleKind) -> Vec<BubbleId> {
        self.records.iter().filter(|r| r.kind == kind).map(|r| r.id).collect()
    }

    pub fn count(&self, kind: BubbleKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BubbleRecord<N>> {
        self.records.iter()
    }

    pub fn retain(&mut self, keep: impl FnMut(&BubbleRecord<N>) -> bool) {
        self.records.retain(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryTree;

    #[test]
    fn test_bubble_id_round_trips_attribute_form() {
        let id = BubbleId(42);
        assert_eq!(id.to_string(), "bubble-42");
        assert_eq!(BubbleId::parse("bubble-42"), Some(id));
        assert_eq!(BubbleId::parse("gloss-42"), None);
    }

    #[test]
    fn test_persistent_marker_shape() {
        let config = AnnotatorConfig::default();
        let mut tree = MemoryTree::new();
        let entry = TermEntry::new("ephemeral", "短暂的").with_tooltip("/ɪˈfem(ə)rəl/");
        let marker = MarkerRenderer::new(&config)
            .persistent(&mut tree, BubbleId(1), "Ephemeral", &entry)
            .unwrap();

        assert_eq!(
            tree.markup(&marker),
            "<span class=\"gloss-term\" data-gloss-kind=\"persistent\" data-gloss-id=\"bubble-1\" \
             data-gloss-term=\"Ephemeral\" title=\"/ɪˈfem(ə)rəl/\">Ephemeral<span class=\"gloss-label\">短暂的</span></span>"
        );
        assert_eq!(marker_kind(&tree, &marker), Some(BubbleKind::Persistent));
        assert_eq!(marker_id(&tree, &marker), Some(BubbleId(1)));
    }

    #[test]
    fn test_refill_replaces_content() {
        let config = AnnotatorConfig::default();
        let renderer = MarkerRenderer::new(&config);
        let mut tree = MemoryTree::new();
        let marker = renderer
            .ephemeral(&mut tree, BubbleId(7), "cat", &BubbleContent::Loading)
            .unwrap();
        assert_eq!(tree.attribute(&marker, ATTR_STATE).as_deref(), Some("loading"));

        let resolved = BubbleContent::Resolved {
            translation: "猫".to_string(),
            phonetic: "/kæt/".to_string(),
            explanation: String::new(),
        };
        renderer.refill(&mut tree, &marker, &resolved).unwrap();

        assert_eq!(tree.attribute(&marker, ATTR_STATE).as_deref(), Some("resolved"));
        assert_eq!(tree.text_content(&marker), "猫/kæt/");
    }

    #[test]
    fn test_registry_tracks_kinds() {
        let mut registry: BubbleRegistry<u32> = BubbleRegistry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert_ne!(a, b);
        registry.insert(BubbleRecord { id: a, kind: BubbleKind::Ephemeral, node: 1, text: "x".into(), content: None });
        registry.insert(BubbleRecord { id: b, kind: BubbleKind::Persistent, node: 2, text: "y".into(), content: None });

        assert_eq!(registry.ids(BubbleKind::Ephemeral), vec![a]);
        assert_eq!(registry.count(BubbleKind::Persistent), 1);
        assert_eq!(registry.ids(BubbleKind::Persistent), vec![b]);
        assert!(registry.remove(a).is_some());
        assert!(registry.get(a).is_none());
    }
}
