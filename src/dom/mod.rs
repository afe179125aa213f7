//! Document tree capability interface
//!
//! The annotator never touches a concrete DOM. Everything it needs from the
//! host document goes through [`DocumentTree`]: locate a node at a point,
//! split a text node, insert, replace and remove nodes, query visibility.
//!
//! Offsets passed to [`DocumentTree::split_text`] and carried in
//! [`TextRange`] are in the tree's native units (UTF-16 code units for the
//! browser backend, bytes for [`MemoryTree`]). The engine only forwards them.

pub mod geometry;
pub mod memory;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use geometry::*;
pub use memory::*;
#[cfg(target_arch = "wasm32")]
pub use web::*;

use std::fmt::Debug;

// =============================================================================
// Types
// =============================================================================

/// Coarse node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Other,
}

/// A live range inside the tree
#[derive(Debug, Clone, PartialEq)]
pub struct TextRange<N> {
    pub start_container: N,
    pub start_offset: usize,
    pub end_container: N,
    pub end_offset: usize,
}

impl<N> TextRange<N> {
    /// The node the selection started in
    pub fn anchor(&self) -> &N {
        &self.start_container
    }
}

/// The user's current selection as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSelection<N> {
    pub text: String,
    pub range: TextRange<N>,
    pub rect: Rect,
}

/// Tree capability failures
#[derive(Debug, Clone, PartialEq)]
pub enum DomError {
    /// The node has no parent where one is required
    Detached,
    /// A text operation was applied to a non-text node
    NotText,
    /// A split offset is past the end of the text
    OffsetOutOfBounds { offset: usize, len: usize },
    /// The reference node is not a child of the given parent
    NotAChild,
    /// The host rejected the operation
    Host(String),
}

impl std::fmt::Display for DomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomError::Detached => write!(f, "Node is detached"),
            DomError::NotText => write!(f, "Node is not a text node"),
            DomError::OffsetOutOfBounds { offset, len } => {
                write!(f, "Offset {} out of bounds for text of length {}", offset, len)
            }
            DomError::NotAChild => write!(f, "Reference node is not a child of parent"),
            DomError::Host(msg) => write!(f, "Host error: {}", msg),
        }
    }
}

impl std::error::Error for DomError {}

// =============================================================================
// DocumentTree
// =============================================================================

/// Narrow view of a live document
pub trait DocumentTree {
    /// Node handle. Cheap to clone, compares by identity.
    type Node: Clone + PartialEq + Debug;

    // ---- queries ----

    /// Document-level container (the body); last-resort insertion target
    fn root(&self) -> Self::Node;
    fn kind(&self, node: &Self::Node) -> NodeKind;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    /// Lower-cased tag name for elements
    fn tag_name(&self, node: &Self::Node) -> Option<String>;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    /// Character data of a text node
    fn text(&self, node: &Self::Node) -> Option<String>;
    /// Computed display/visibility check
    fn is_visible(&self, node: &Self::Node) -> bool;
    /// Topmost element under a viewport point
    fn element_at_point(&self, point: Point) -> Option<Self::Node>;
    fn selection(&self) -> Option<LiveSelection<Self::Node>>;

    // ---- mutations ----

    fn create_element(&mut self, tag: &str) -> Result<Self::Node, DomError>;
    fn create_text(&mut self, text: &str) -> Result<Self::Node, DomError>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), DomError>;
    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), DomError>;
    /// Insert `child` before `reference`, or append when `reference` is None
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), DomError>;
    /// Substitute `old` with `replacement` in one mutation
    fn replace_with(&mut self, old: &Self::Node, replacement: &[Self::Node]) -> Result<(), DomError>;
    fn remove(&mut self, node: &Self::Node) -> Result<(), DomError>;
    /// Split a text node at `offset`; returns the new node holding the tail
    fn split_text(&mut self, node: &Self::Node, offset: usize) -> Result<Self::Node, DomError>;
    /// Merge adjacent text children and drop empty ones
    fn normalize(&mut self, node: &Self::Node) -> Result<(), DomError>;

    // ---- provided ----

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    fn is_text(&self, node: &Self::Node) -> bool {
        self.kind(node) == NodeKind::Text
    }

    fn is_element(&self, node: &Self::Node) -> bool {
        self.kind(node) == NodeKind::Element
    }

    fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        let parent = self.parent(node)?;
        let siblings = self.children(&parent);
        let idx = siblings.iter().position(|n| n == node)?;
        if idx == 0 {
            None
        } else {
            siblings.get(idx - 1).cloned()
        }
    }

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        let parent = self.parent(node)?;
        let siblings = self.children(&parent);
        let idx = siblings.iter().position(|n| n == node)?;
        siblings.get(idx + 1).cloned()
    }

    /// Byte index into `text` for a native `offset` into the same text
    ///
    /// Native offsets are bytes unless a backend says otherwise.
    fn byte_offset(&self, text: &str, offset: usize) -> usize {
        let mut at = offset.min(text.len());
        while !text.is_char_boundary(at) {
            at -= 1;
        }
        at
    }

    /// Concatenated text of all descendant text nodes
    fn text_content(&self, node: &Self::Node) -> String {
        let mut out = String::new();
        collect_text(self, node, &mut out);
        out
    }

    /// `node` itself when it is an element, else its nearest element ancestor
    fn nearest_element(&self, node: &Self::Node) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if self.is_element(&n) {
                return Some(n);
            }
            current = self.parent(&n);
        }
        None
    }

    /// True when `ancestor` is `node` or one of its ancestors
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if &n == ancestor {
                return true;
            }
            current = self.parent(&n);
        }
        false
    }

    /// Pre-order list of all descendants of `node` (excluding itself)
    fn descendants(&self, node: &Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack: Vec<Self::Node> = self.children(node).into_iter().rev().collect();
        while let Some(n) = stack.pop() {
            stack.extend(self.children(&n).into_iter().rev());
            out.push(n);
        }
        out
    }
}

fn collect_text<T: DocumentTree + ?Sized>(tree: &T, node: &T::Node, out: &mut String) {
    match tree.kind(node) {
        NodeKind::Text => {
            if let Some(t) = tree.text(node) {
                out.push_str(&t);
            }
        }
        NodeKind::Element => {
            for child in tree.children(node) {
                collect_text(tree, &child, out);
            }
        }
        NodeKind::Other => {}
    }
}
