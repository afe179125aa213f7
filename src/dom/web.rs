//! WebTree: browser DOM backend via web-sys
//!
//! Offsets follow the DOM convention (UTF-16 code units).

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Node, Text, Window};

use super::{DocumentTree, DomError, LiveSelection, NodeKind, Point, Rect, TextRange};

fn host(e: JsValue) -> DomError {
    DomError::Host(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

/// Live document of the current window
pub struct WebTree {
    window: Window,
    document: Document,
}

impl WebTree {
    /// Bind to `window.document`; None outside a browsing context
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }

    fn element<'a>(&self, node: &'a Node) -> Option<&'a Element> {
        node.dyn_ref::<Element>()
    }

    fn computed(&self, el: &Element, property: &str) -> Option<String> {
        let style = self.window.get_computed_style(el).ok()??;
        style.get_property_value(property).ok()
    }
}

impl DocumentTree for WebTree {
    type Node = Node;

    fn root(&self) -> Node {
        match self.document.body() {
            Some(body) => body.into(),
            None => self.document.clone().into(),
        }
    }

    fn kind(&self, node: &Node) -> NodeKind {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeKind::Element,
            Node::TEXT_NODE => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.get(i)).collect()
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        self.element(node).map(|e| e.tag_name().to_ascii_lowercase())
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn text(&self, node: &Node) -> Option<String> {
        if node.node_type() == Node::TEXT_NODE {
            node.node_value()
        } else {
            None
        }
    }

    fn is_visible(&self, node: &Node) -> bool {
        let Some(el) = self.nearest_element(node) else {
            return false;
        };
        let Some(el) = el.dyn_ref::<Element>() else {
            return false;
        };
        let display = self.computed(el, "display").unwrap_or_default();
        let visibility = self.computed(el, "visibility").unwrap_or_default();
        display != "none" && visibility != "hidden"
    }

    fn element_at_point(&self, point: Point) -> Option<Node> {
        self.document
            .element_from_point(point.x as f32, point.y as f32)
            .map(Into::into)
    }

    fn selection(&self) -> Option<LiveSelection<Node>> {
        let selection = self.window.get_selection().ok()??;
        if selection.range_count() == 0 {
            return None;
        }
        let range = selection.get_range_at(0).ok()?;
        let rect = range.get_bounding_client_rect();
        Some(LiveSelection {
            text: String::from(selection.to_string()),
            range: TextRange {
                start_container: range.start_container().ok()?,
                start_offset: range.start_offset().ok()? as usize,
                end_container: range.end_container().ok()?,
                end_offset: range.end_offset().ok()? as usize,
            },
            rect: Rect::new(rect.x(), rect.y(), rect.width(), rect.height()),
        })
    }

    fn create_element(&mut self, tag: &str) -> Result<Node, DomError> {
        self.document.create_element(tag).map(Into::into).map_err(host)
    }

    fn create_text(&mut self, text: &str) -> Result<Node, DomError> {
        Ok(self.document.create_text_node(text).into())
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> Result<(), DomError> {
        let el = self.element(node).ok_or_else(|| DomError::Host("Not an element".to_string()))?;
        el.set_attribute(name, value).map_err(host)
    }

    fn remove_attribute(&mut self, node: &Node, name: &str) -> Result<(), DomError> {
        let el = self.element(node).ok_or_else(|| DomError::Host("Not an element".to_string()))?;
        el.remove_attribute(name).map_err(host)
    }

    fn insert_before(
        &mut self,
        parent: &Node,
        child: &Node,
        reference: Option<&Node>,
    ) -> Result<(), DomError> {
        if let Some(r) = reference {
            if r.parent_node().as_ref() != Some(parent) {
                return Err(DomError::NotAChild);
            }
        }
        parent.insert_before(child, reference).map(|_| ()).map_err(host)
    }

    fn replace_with(&mut self, old: &Node, replacement: &[Node]) -> Result<(), DomError> {
        let parent = old.parent_node().ok_or(DomError::Detached)?;
        let fragment = self.document.create_document_fragment();
        for node in replacement {
            fragment.append_child(node).map_err(host)?;
        }
        parent.replace_child(&fragment, old).map(|_| ()).map_err(host)
    }

    fn remove(&mut self, node: &Node) -> Result<(), DomError> {
        match node.parent_node() {
            Some(parent) => parent.remove_child(node).map(|_| ()).map_err(host),
            None => Ok(()),
        }
    }

    fn byte_offset(&self, text: &str, offset: usize) -> usize {
        let mut units = 0;
        for (idx, ch) in text.char_indices() {
            if units >= offset {
                return idx;
            }
            units += ch.len_utf16();
        }
        text.len()
    }

    fn split_text(&mut self, node: &Node, offset: usize) -> Result<Node, DomError> {
        let text = node.dyn_ref::<Text>().ok_or(DomError::NotText)?;
        let len = text.length() as usize;
        if offset > len {
            return Err(DomError::OffsetOutOfBounds { offset, len });
        }
        text.split_text(offset as u32).map(Into::into).map_err(host)
    }

    fn normalize(&mut self, node: &Node) -> Result<(), DomError> {
        node.normalize();
        Ok(())
    }
}
