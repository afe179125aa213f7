//! Lookup context: the sentence a selection was made in

use unicode_segmentation::UnicodeSegmentation;

use crate::annotate::{marker_kind, BubbleKind, ATTR_TERM};
use crate::dom::{DocumentTree, NodeKind};
use crate::gesture::SelectionSnapshot;

/// The sentence(s) of `paragraph` covering `selection`, at most `max_chars` long
///
/// When `selection` appears more than once, the occurrence closest to byte
/// `near` wins (the first one without a hint). Falls back to the selection
/// itself when it cannot be located.
pub fn sentence_context(paragraph: &str, selection: &str, near: Option<usize>, max_chars: usize) -> String {
    let needle = selection.trim();
    let Some(pos) = locate(paragraph, needle, near) else {
        return clip(needle, 0, needle, max_chars);
    };
    let needle_end = pos + needle.len();

    let mut start = None;
    let mut end = paragraph.len();
    for (offset, sentence) in paragraph.split_sentence_bound_indices() {
        let sentence_end = offset + sentence.len();
        if start.is_none() && pos < sentence_end {
            start = Some(offset);
        }
        if needle_end <= sentence_end {
            end = sentence_end;
            break;
        }
    }

    let start = start.unwrap_or(0);
    let raw = &paragraph[start..end];
    let lead = raw.len() - raw.trim_start().len();
    clip(raw.trim(), (pos - start).saturating_sub(lead), needle, max_chars)
}

fn locate(paragraph: &str, needle: &str, near: Option<usize>) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let mut found = paragraph.match_indices(needle).map(|(idx, _)| idx);
    match near {
        Some(near) => found.min_by_key(|idx| idx.abs_diff(near)),
        None => found.next(),
    }
}

/// Context for a snapshot: the text of the element holding the selection
pub fn lookup_context<T: DocumentTree>(
    tree: &T,
    snapshot: &SelectionSnapshot<T::Node>,
    max_chars: usize,
) -> String {
    let mut walk = TextWalk {
        anchor: snapshot.range.anchor(),
        anchor_offset: snapshot.range.start_offset,
        text: String::new(),
        anchor_at: None,
    };
    if let Some(element) = tree.nearest_element(walk.anchor) {
        // Selecting inside a marker: read the marker's surroundings
        let element = match marker_kind(tree, &element) {
            Some(_) => tree.parent(&element).unwrap_or(element),
            None => element,
        };
        walk.visit(tree, &element);
    }
    sentence_context(&walk.text, &snapshot.text, walk.anchor_at, max_chars)
}

/// Text as the page reads without bubbles: persistent markers contribute
/// the word they cover, other bubbles nothing
struct TextWalk<'a, N> {
    anchor: &'a N,
    anchor_offset: usize,
    text: String,
    /// Byte position of the selection start in `text`
    anchor_at: Option<usize>,
}

impl<N: Clone + PartialEq> TextWalk<'_, N> {
    fn visit<T: DocumentTree<Node = N>>(&mut self, tree: &T, node: &N) {
        for child in tree.children(node) {
            match (tree.kind(&child), marker_kind(tree, &child)) {
                (_, Some(BubbleKind::Persistent)) => {
                    if tree.contains(&child, self.anchor) {
                        self.anchor_at = Some(self.text.len());
                    }
                    self.text.push_str(&tree.attribute(&child, ATTR_TERM).unwrap_or_default());
                }
                (_, Some(_)) => {}
                (NodeKind::Text, None) => {
                    let text = tree.text(&child).unwrap_or_default();
                    if &child == self.anchor {
                        self.anchor_at = Some(self.text.len() + tree.byte_offset(&text, self.anchor_offset));
                    }
                    self.text.push_str(&text);
                }
                (NodeKind::Element, None) => self.visit(tree, &child),
                (NodeKind::Other, None) => {}
            }
        }
    }
}

/// Cut `text` to `max_chars` characters, keeping `needle` at byte `at` roughly centred
fn clip(text: &str, at: usize, needle: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let needle_chars = needle.chars().count();
    let needle_at = text.get(..at).map(|head| head.chars().count()).unwrap_or(0);
    let slack = max_chars.saturating_sub(needle_chars) / 2;
    let from = needle_at.saturating_sub(slack).min(total - max_chars);
    text.chars().skip(from).take(max_chars).collect::<String>().trim().to_string()
}
