//! MemoryTree: arena-backed document tree
//!
//! A small, deterministic stand-in for a browser DOM. Used by the test
//! suites and by native hosts that want to annotate a parsed document.

use super::{DocumentTree, DomError, LiveSelection, NodeKind, Point, Rect, TextRange};

// =============================================================================
// Types
// =============================================================================

/// Handle into a [`MemoryTree`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element { tag: String, attrs: Vec<(String, String)> },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct MemNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    hidden: bool,
    rect: Option<Rect>,
}

// =============================================================================
// MemoryTree
// =============================================================================

/// In-memory document tree rooted at a `body` element
#[derive(Debug, Clone)]
pub struct MemoryTree {
    nodes: Vec<MemNode>,
    root: NodeId,
    selection: Option<LiveSelection<NodeId>>,
    mutations: usize,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        let body = MemNode {
            data: NodeData::Element { tag: "body".to_string(), attrs: Vec::new() },
            parent: None,
            children: Vec::new(),
            hidden: false,
            rect: None,
        };
        Self {
            nodes: vec![body],
            root: NodeId(0),
            selection: None,
            mutations: 0,
        }
    }

    // ---- builders ----

    /// Append a new element under `parent`
    pub fn add_element(&mut self, parent: &NodeId, tag: &str) -> NodeId {
        let id = self.alloc(NodeData::Element { tag: tag.to_ascii_lowercase(), attrs: Vec::new() });
        self.attach(*parent, id, None);
        id
    }

    /// Append a new element with a class attribute
    pub fn add_element_with_class(&mut self, parent: &NodeId, tag: &str, class: &str) -> NodeId {
        let id = self.add_element(parent, tag);
        self.put_attr(id, "class", class);
        id
    }

    /// Append a new text node under `parent`
    pub fn add_text(&mut self, parent: &NodeId, text: &str) -> NodeId {
        let id = self.alloc(NodeData::Text(text.to_string()));
        self.attach(*parent, id, None);
        id
    }

    pub fn add_comment(&mut self, parent: &NodeId, text: &str) -> NodeId {
        let id = self.alloc(NodeData::Comment(text.to_string()));
        self.attach(*parent, id, None);
        id
    }

    /// Mark a node as `display: none`
    pub fn hide(&mut self, node: &NodeId) {
        self.nodes[node.0].hidden = true;
    }

    /// Give an element a layout box for hit testing
    pub fn set_rect(&mut self, node: &NodeId, rect: Rect) {
        self.nodes[node.0].rect = Some(rect);
    }

    /// Select `[start, end)` between two text positions
    pub fn select(&mut self, start: (NodeId, usize), end: (NodeId, usize), rect: Rect) {
        let text = self.range_text(start, end);
        self.selection = Some(LiveSelection {
            text,
            range: TextRange {
                start_container: start.0,
                start_offset: start.1,
                end_container: end.0,
                end_offset: end.1,
            },
            rect,
        });
    }

    /// Select `[start, end)` inside one text node
    pub fn select_text(&mut self, node: &NodeId, start: usize, end: usize, rect: Rect) {
        self.select((*node, start), (*node, end), rect);
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Number of mutating calls applied so far
    pub fn mutation_count(&self) -> usize {
        self.mutations
    }

    /// Serialize a subtree as markup, attributes in insertion order
    pub fn markup(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.write_markup(*node, &mut out);
        out
    }

    // ---- internals ----

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemNode {
            data,
            parent: None,
            children: Vec::new(),
            hidden: false,
            rect: None,
        });
        id
    }

    fn exists(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        match index {
            Some(i) if i <= children.len() => children.insert(i, child),
            _ => children.push(child),
        }
        self.nodes[child.0].parent = Some(parent);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    fn put_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[node.0].data {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes[n.0].parent;
        }
        false
    }

    fn text_nodes_in_order(&self) -> Vec<NodeId> {
        self.descendants(&self.root)
            .into_iter()
            .filter(|n| matches!(self.nodes[n.0].data, NodeData::Text(_)))
            .collect()
    }

    fn range_text(&self, start: (NodeId, usize), end: (NodeId, usize)) -> String {
        let slice = |id: NodeId, from: usize, to: Option<usize>| -> String {
            match &self.nodes[id.0].data {
                NodeData::Text(t) => {
                    let to = to.unwrap_or(t.len()).min(t.len());
                    t.get(from.min(to)..to).unwrap_or_default().to_string()
                }
                _ => String::new(),
            }
        };
        if start.0 == end.0 {
            return slice(start.0, start.1, Some(end.1));
        }
        let order = self.text_nodes_in_order();
        let (Some(a), Some(b)) = (
            order.iter().position(|n| *n == start.0),
            order.iter().position(|n| *n == end.0),
        ) else {
            return String::new();
        };
        if a > b {
            return String::new();
        }
        let mut out = slice(start.0, start.1, None);
        for id in &order[a + 1..b] {
            out.push_str(&slice(*id, 0, None));
        }
        out.push_str(&slice(end.0, 0, Some(end.1)));
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Text(t) => out.push_str(t),
            NodeData::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", k, v));
                }
                out.push('>');
                for child in &self.nodes[node.0].children {
                    self.write_markup(*child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }

    fn normalize_node(&mut self, node: NodeId) {
        enum Step {
            Drop,
            Merge(String),
            Recurse,
            Keep,
        }

        let children = self.nodes[node.0].children.clone();
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
        for child in children {
            let prev_is_text = kept
                .last()
                .map(|prev| matches!(self.nodes[prev.0].data, NodeData::Text(_)))
                .unwrap_or(false);
            let step = match &self.nodes[child.0].data {
                NodeData::Text(t) if t.is_empty() => Step::Drop,
                NodeData::Text(t) if prev_is_text => Step::Merge(t.clone()),
                NodeData::Element { .. } => Step::Recurse,
                _ => Step::Keep,
            };
            match step {
                Step::Drop => self.nodes[child.0].parent = None,
                Step::Merge(tail) => {
                    if let Some(prev) = kept.last() {
                        if let NodeData::Text(prev_text) = &mut self.nodes[prev.0].data {
                            prev_text.push_str(&tail);
                        }
                    }
                    self.nodes[child.0].parent = None;
                }
                Step::Recurse => {
                    self.normalize_node(child);
                    kept.push(child);
                }
                Step::Keep => kept.push(child),
            }
        }
        self.nodes[node.0].children = kept;
    }
}

impl DocumentTree for MemoryTree {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.root
    }

    fn kind(&self, node: &NodeId) -> NodeKind {
        match self.nodes.get(node.0).map(|n| &n.data) {
            Some(NodeData::Element { .. }) => NodeKind::Element,
            Some(NodeData::Text(_)) => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.nodes.get(node.0).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { attrs, .. } => {
                attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
            }
            _ => None,
        }
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Text(t) => Some(t.clone()),
            _ => None,
        }
    }

    fn is_visible(&self, node: &NodeId) -> bool {
        let mut current = Some(*node);
        while let Some(n) = current {
            match self.nodes.get(n.0) {
                Some(mem) if mem.hidden => return false,
                Some(mem) => current = mem.parent,
                None => return false,
            }
        }
        true
    }

    fn element_at_point(&self, point: Point) -> Option<NodeId> {
        let mut hit = None;
        let mut candidates = vec![self.root];
        candidates.extend(self.descendants(&self.root));
        for id in candidates {
            let mem = &self.nodes[id.0];
            if let (NodeData::Element { .. }, Some(rect)) = (&mem.data, mem.rect) {
                if rect.contains(point) && self.is_visible(&id) {
                    hit = Some(id);
                }
            }
        }
        hit
    }

    fn selection(&self) -> Option<LiveSelection<NodeId>> {
        self.selection.clone()
    }

    fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(DomError::Host(format!("Invalid tag name: {:?}", tag)));
        }
        Ok(self.alloc(NodeData::Element { tag: tag.to_ascii_lowercase(), attrs: Vec::new() }))
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId, DomError> {
        Ok(self.alloc(NodeData::Text(text.to_string())))
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), DomError> {
        if self.kind(node) != NodeKind::Element {
            return Err(DomError::Host("Attributes require an element".to_string()));
        }
        self.mutations += 1;
        self.put_attr(*node, name, value);
        Ok(())
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), DomError> {
        self.mutations += 1;
        if let Some(NodeData::Element { attrs, .. }) = self.nodes.get_mut(node.0).map(|n| &mut n.data) {
            attrs.retain(|(k, _)| k != name);
        }
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), DomError> {
        if !self.exists(*parent) || !self.exists(*child) {
            return Err(DomError::Host("Unknown node".to_string()));
        }
        if self.kind(parent) != NodeKind::Element {
            return Err(DomError::Host("Parent must be an element".to_string()));
        }
        if self.is_ancestor_or_self(*child, *parent) {
            return Err(DomError::Host("Insertion would create a cycle".to_string()));
        }
        if let Some(r) = reference {
            if self.nodes.get(r.0).and_then(|n| n.parent) != Some(*parent) {
                return Err(DomError::NotAChild);
            }
        }
        self.mutations += 1;
        self.detach(*child);
        let index = reference.and_then(|r| self.nodes[parent.0].children.iter().position(|c| c == r));
        self.attach(*parent, *child, index);
        Ok(())
    }

    fn replace_with(&mut self, old: &NodeId, replacement: &[NodeId]) -> Result<(), DomError> {
        let parent = self.parent(old).ok_or(DomError::Detached)?;
        if replacement.iter().any(|r| !self.exists(*r) || self.is_ancestor_or_self(*r, parent) || r == old) {
            return Err(DomError::Host("Invalid replacement node".to_string()));
        }
        self.mutations += 1;
        for r in replacement {
            self.detach(*r);
        }
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| c == old)
            .ok_or(DomError::NotAChild)?;
        self.nodes[parent.0].children.remove(index);
        self.nodes[old.0].parent = None;
        for (offset, r) in replacement.iter().enumerate() {
            self.nodes[parent.0].children.insert(index + offset, *r);
            self.nodes[r.0].parent = Some(parent);
        }
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> Result<(), DomError> {
        if !self.exists(*node) {
            return Err(DomError::Host("Unknown node".to_string()));
        }
        self.mutations += 1;
        self.detach(*node);
        Ok(())
    }

    fn split_text(&mut self, node: &NodeId, offset: usize) -> Result<NodeId, DomError> {
        let text = self.text(node).ok_or(DomError::NotText)?;
        if offset > text.len() || !text.is_char_boundary(offset) {
            return Err(DomError::OffsetOutOfBounds { offset, len: text.len() });
        }
        self.mutations += 1;
        let tail = text[offset..].to_string();
        if let NodeData::Text(t) = &mut self.nodes[node.0].data {
            t.truncate(offset);
        }
        let new = self.alloc(NodeData::Text(tail));
        if let Some(parent) = self.nodes[node.0].parent {
            let index = self.nodes[parent.0].children.iter().position(|c| c == node).map(|i| i + 1);
            self.attach(parent, new, index);
        }
        Ok(new)
    }

    fn normalize(&mut self, node: &NodeId) -> Result<(), DomError> {
        if self.kind(node) != NodeKind::Element {
            return Ok(());
        }
        self.mutations += 1;
        self.normalize_node(*node);
        Ok(())
    }
}
