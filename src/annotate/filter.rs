//! NodeFilter: which text nodes a scan may rewrite
//!
//! Conservative by construction: it gives up recall to stay away from
//! scripts, form controls, UI chrome and anything already annotated.

use std::collections::HashSet;

use super::bubble::marker_kind;
use crate::config::AnnotatorConfig;
use crate::dom::DocumentTree;

pub struct NodeFilter {
    excluded_tags: HashSet<String>,
    chrome_keywords: Vec<String>,
    min_chars: usize,
    max_chars: usize,
}

impl NodeFilter {
    pub fn new(config: &AnnotatorConfig) -> Self {
        Self {
            excluded_tags: config.excluded_tags.iter().map(|t| t.to_ascii_lowercase()).collect(),
            chrome_keywords: config.chrome_class_keywords.iter().map(|k| k.to_lowercase()).collect(),
            min_chars: config.min_text_chars,
            max_chars: config.max_text_chars,
        }
    }

    pub fn is_excluded_tag(&self, tag: &str) -> bool {
        self.excluded_tags.contains(&tag.to_ascii_lowercase())
    }

    /// Class attribute mentions a UI-chrome keyword
    pub fn is_chrome_class(&self, class: &str) -> bool {
        let class = class.to_lowercase();
        self.chrome_keywords.iter().any(|k| class.contains(k.as_str()))
    }

    pub fn accepts_length(&self, text: &str) -> bool {
        let chars = text.trim().chars().count();
        chars >= self.min_chars && chars <= self.max_chars
    }

    /// Whether a scan may rewrite this text node
    pub fn should_process<T: DocumentTree>(&self, tree: &T, node: &T::Node) -> bool {
        self.check(tree, node, |parent| contains_marker(tree, parent))
    }

    /// [`should_process`](Self::should_process) with marker containment
    /// answered from a precomputed [`MarkedElements`]
    pub fn should_process_within<T: DocumentTree>(
        &self,
        tree: &T,
        node: &T::Node,
        marked: &MarkedElements<T::Node>,
    ) -> bool {
        self.check(tree, node, |parent| marked.contains(parent))
    }

    fn check<T: DocumentTree>(&self, tree: &T, node: &T::Node, holds_marker: impl Fn(&T::Node) -> bool) -> bool {
        let Some(text) = tree.text(node) else {
            return false;
        };
        let Some(parent) = tree.parent(node) else {
            return false;
        };
        if let Some(tag) = tree.tag_name(&parent) {
            if self.is_excluded_tag(&tag) {
                return false;
            }
        }
        if let Some(class) = tree.attribute(&parent, "class") {
            if self.is_chrome_class(&class) {
                return false;
            }
        }
        if !self.accepts_length(&text) {
            return false;
        }
        if marker_kind(tree, &parent).is_some() || holds_marker(&parent) {
            return false;
        }
        tree.is_visible(&parent)
    }

    /// Whether a scan should descend into `element` at all
    pub fn should_descend<T: DocumentTree>(&self, tree: &T, element: &T::Node) -> bool {
        if marker_kind(tree, element).is_some() {
            return false;
        }
        match tree.tag_name(element) {
            Some(tag) => !self.is_excluded_tag(&tag),
            None => true,
        }
    }
}

/// Any bubble marker among the descendants of `node`
pub fn contains_marker<T: DocumentTree>(tree: &T, node: &T::Node) -> bool {
    tree.descendants(node).iter().any(|n| marker_kind(tree, n).is_some())
}

/// Every ancestor of a bubble marker under one root, gathered in one walk
#[derive(Debug, Clone, Default)]
pub struct MarkedElements<N> {
    nodes: Vec<N>,
}

impl<N: Clone + PartialEq> MarkedElements<N> {
    pub fn collect<T: DocumentTree<Node = N>>(tree: &T, root: &N) -> Self {
        let mut nodes: Vec<N> = Vec::new();
        for marker in tree.descendants(root).iter().filter(|n| marker_kind(tree, n).is_some()) {
            let mut current = tree.parent(marker);
            while let Some(n) = current {
                if nodes.contains(&n) {
                    break;
                }
                current = tree.parent(&n);
                nodes.push(n);
            }
        }
        Self { nodes }
    }

    /// `node` has a marker somewhere below it
    pub fn contains(&self, node: &N) -> bool {
        self.nodes.contains(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::bubble::{BubbleId, MarkerRenderer, TermEntry};
    use crate::dom::MemoryTree;

    fn filter() -> NodeFilter {
        NodeFilter::new(&AnnotatorConfig::default())
    }

    #[test]
    fn test_plain_paragraph_is_processed() {
        let mut tree = MemoryTree::new();
        let body = tree.root();
        let p = tree.add_element(&body, "p");
        let t = tree.add_text(&p, "An ordinary sentence.");
        assert!(filter().should_process(&tree, &t));
    }

    #[test]
    fn test_excluded_tags() {
        let mut tree = MemoryTree::new();
        let body = tree.root();
        for tag in ["script", "style", "textarea", "noscript", "SELECT"] {
            let el = tree.add_element(&body, tag);
            let t = tree.add_text(&el, "some content here");
            assert!(!filter().should_process(&tree, &t), "{}", tag);
        }
    }

    #[test]
    fn test_chrome_classes() {
        let mut tree = MemoryTree::new();
        let body = tree.root();
        for class in ["site-Header", "main-nav", "btn primary", "Toolbar"] {
            let el = tree.add_element_with_class(&body, "div", class);
            let t = tree.add_text(&el, "some content here");
            assert!(!filter().should_process(&tree, &t), "{}", class);
        }
        let el = tree.add_element_with_class(&body, "div", "article-body");
        let t = tree.add_text(&el, "some content here");
        assert!(filter().should_process(&tree, &t));
    }

    #[test]
    fn test_length_bounds_use_trimmed_text() {
        let f = filter();
        assert!(!f.accepts_length("  ab  "));
        assert!(f.accepts_length("  abc  "));
        assert!(f.accepts_length(&"x".repeat(500)));
        assert!(!f.accepts_length(&"x".repeat(501)));
    }

    #[test]
    fn test_hidden_parent_is_skipped() {
        let mut tree = MemoryTree::new();
        let body = tree.root();
        let div = tree.add_element(&body, "div");
        let t = tree.add_text(&div, "invisible words");
        tree.hide(&div);
        assert!(!filter().should_process(&tree, &t));
    }

    #[test]
    fn test_parent_with_marker_is_skipped() {
        let config = AnnotatorConfig::default();
        let mut tree = MemoryTree::new();
        let body = tree.root();
        let p = tree.add_element(&body, "p");
        let t = tree.add_text(&p, "before the marker");
        let marker = MarkerRenderer::new(&config)
            .persistent(&mut tree, BubbleId(1), "word", &TermEntry::new("word", "label"))
            .unwrap();
        tree.append_child(&p, &marker).unwrap();

        assert!(!filter().should_process(&tree, &t));
        assert!(!filter().should_descend(&tree, &marker));
        let inner = tree.children(&marker)[0];
        assert!(!filter().should_process(&tree, &inner));
    }

    #[test]
    fn test_marked_elements_match_per_node_check() {
        let config = AnnotatorConfig::default();
        let mut tree = MemoryTree::new();
        let body = tree.root();
        let p = tree.add_element(&body, "p");
        let before = tree.add_text(&p, "text beside a nested bubble");
        let b = tree.add_element(&p, "b");
        let marker = MarkerRenderer::new(&config)
            .persistent(&mut tree, BubbleId(1), "word", &TermEntry::new("word", "label"))
            .unwrap();
        tree.append_child(&b, &marker).unwrap();
        let clean = tree.add_element(&body, "p");
        let plain = tree.add_text(&clean, "nothing annotated here");

        let marked = MarkedElements::collect(&tree, &body);
        assert!(marked.contains(&p) && marked.contains(&b) && marked.contains(&body));
        assert!(!marked.contains(&clean));
        assert_eq!(marked.len(), 3);

        let f = filter();
        for node in [before, plain] {
            assert_eq!(f.should_process_within(&tree, &node, &marked), f.should_process(&tree, &node));
        }
        assert!(!f.should_process_within(&tree, &before, &marked));
        assert!(f.should_process_within(&tree, &plain, &marked));
    }

    #[test]
    fn test_non_text_nodes_are_rejected() {
        let mut tree = MemoryTree::new();
        let body = tree.root();
        let p = tree.add_element(&body, "p");
        let c = tree.add_comment(&p, "a comment node");
        assert!(!filter().should_process(&tree, &p));
        assert!(!filter().should_process(&tree, &c));
    }
}
