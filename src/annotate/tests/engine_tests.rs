//! Tests for the AnnotationEngine over MemoryTree
//!
//! Covers scan rewriting and idempotence, the node filter inside a scan,
//! ephemeral insertion and updates, deduplication and removal rules.

use regex::Regex;

use crate::annotate::bubble::{
    marker_kind, BubbleContent, BubbleId, BubbleKind, TermEntry, ATTR_HIGHLIGHT, ATTR_STATE, ATTR_TERM,
};
use crate::annotate::engine::AnnotationEngine;
use crate::dom::{DocumentTree, MemoryTree, NodeId, Rect, TextRange};
use crate::gesture::SelectionSnapshot;

const SENTENCE: &str = "the effect was ephemeral and brief";

fn page(text: &str) -> (MemoryTree, NodeId, NodeId) {
    let mut tree = MemoryTree::new();
    let body = tree.root();
    let p = tree.add_element(&body, "p");
    let t = tree.add_text(&p, text);
    (tree, p, t)
}

fn terms() -> Vec<TermEntry> {
    vec![TermEntry::new("ephemeral", "短暂的")]
}

fn snapshot(node: NodeId, start: usize, end: usize, text: &str) -> SelectionSnapshot<NodeId> {
    SelectionSnapshot {
        text: text.to_string(),
        range: TextRange {
            start_container: node,
            start_offset: start,
            end_container: node,
            end_offset: end,
        },
        rect: Rect::new(0.0, 0.0, 10.0, 10.0),
    }
}

/// Markup with bubble ids blanked, so two scans can be compared
fn structure(tree: &MemoryTree, node: &NodeId) -> String {
    let ids = Regex::new(r#" data-gloss-id="bubble-\d+""#).unwrap();
    ids.replace_all(&tree.markup(node), "").into_owned()
}

/// Document text with every marker reduced to the text it covers
fn stripped_text(tree: &MemoryTree, node: &NodeId) -> String {
    let mut out = String::new();
    for child in tree.children(node) {
        match marker_kind(tree, &child) {
            Some(BubbleKind::Persistent) => out.push_str(&tree.attribute(&child, ATTR_TERM).unwrap()),
            Some(_) => {}
            None if tree.is_text(&child) => out.push_str(&tree.text(&child).unwrap()),
            None => out.push_str(&stripped_text(tree, &child)),
        }
    }
    out
}

fn persistent_markers(tree: &MemoryTree) -> Vec<NodeId> {
    tree.descendants(&tree.root())
        .into_iter()
        .filter(|n| marker_kind(tree, n) == Some(BubbleKind::Persistent))
        .collect()
}

// ============================================================================
// Scan
// ============================================================================

#[test]
fn test_scan_marks_single_occurrence() {
    let (mut tree, p, _) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();
    let body = tree.root();

    let report = engine.scan(&mut tree, &body, &terms());

    assert_eq!(report.markers_created, 1);
    assert_eq!(report.nodes_rewritten, 1);
    assert_eq!(report.nodes_visited, 1);
    let children = tree.children(&p);
    assert_eq!(children.len(), 3);
    assert_eq!(tree.text(&children[0]).as_deref(), Some("the effect was "));
    assert_eq!(marker_kind(&tree, &children[1]), Some(BubbleKind::Persistent));
    assert_eq!(tree.text(&children[2]).as_deref(), Some(" and brief"));
    assert_eq!(
        tree.markup(&p),
        "<p>the effect was <span class=\"gloss-term\" data-gloss-kind=\"persistent\" data-gloss-id=\"bubble-1\" \
         data-gloss-term=\"ephemeral\">ephemeral<span class=\"gloss-label\">短暂的</span></span> and brief</p>"
    );
    assert_eq!(engine.bubble_count(BubbleKind::Persistent), 1);
}

#[test]
fn test_scan_marks_every_occurrence() {
    let (mut tree, p, _) = page("cat and dog and cat again");
    let mut engine = AnnotationEngine::default();
    let body = tree.root();
    let entries = vec![TermEntry::new("cat", "猫"), TermEntry::new("dog", "狗")];

    let report = engine.scan(&mut tree, &body, &entries);

    assert_eq!(report.markers_created, 3);
    assert_eq!(report.nodes_rewritten, 1);
    assert_eq!(persistent_markers(&tree).len(), 3);
    assert_eq!(tree.children(&p).len(), 6);
    assert_eq!(stripped_text(&tree, &p), "cat and dog and cat again");
}

#[test]
fn test_scan_twice_is_idempotent() {
    let mut tree = MemoryTree::new();
    let body = tree.root();
    let p = tree.add_element(&body, "p");
    tree.add_text(&p, "Ephemeral things are ephemeral.");
    let div = tree.add_element(&body, "div");
    tree.add_text(&div, "Nothing ephemeral lasts; cat naps are ephemeral too.");
    let entries = vec![TermEntry::new("ephemeral", "短暂的"), TermEntry::new("cat", "猫")];
    let mut engine = AnnotationEngine::default();

    let first = engine.scan(&mut tree, &body, &entries);
    let after_first = structure(&tree, &body);
    let second = engine.scan(&mut tree, &body, &entries);
    let after_second = structure(&tree, &body);

    assert_eq!(after_first, after_second);
    assert_eq!(first.markers_created, second.markers_created);
    assert_eq!(second.markers_removed, first.markers_created);
    assert_eq!(engine.bubble_count(BubbleKind::Persistent), first.markers_created);
}

#[test]
fn test_scan_with_empty_terms_restores_text() {
    let (mut tree, p, _) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();
    let body = tree.root();

    engine.scan(&mut tree, &body, &terms());
    let report = engine.scan(&mut tree, &body, &[]);

    assert_eq!(report.markers_removed, 1);
    assert_eq!(tree.markup(&p), format!("<p>{}</p>", SENTENCE));
    assert_eq!(tree.children(&p).len(), 1);
    assert_eq!(engine.bubble_count(BubbleKind::Persistent), 0);
}

#[test]
fn test_scan_skips_filtered_nodes() {
    let mut tree = MemoryTree::new();
    let body = tree.root();
    let script = tree.add_element(&body, "script");
    tree.add_text(&script, "var ephemeral = 1;");
    let nav = tree.add_element_with_class(&body, "div", "top-nav");
    tree.add_text(&nav, "ephemeral link");
    let hidden = tree.add_element(&body, "p");
    tree.add_text(&hidden, "hidden ephemeral text");
    tree.hide(&hidden);
    let deep = tree.add_element(&body, "textarea");
    let inner = tree.add_element(&deep, "b");
    tree.add_text(&inner, "ephemeral inside a form control");
    let ok = tree.add_element(&body, "p");
    tree.add_text(&ok, "an ephemeral moment");

    let mut engine = AnnotationEngine::default();
    let report = engine.scan(&mut tree, &body, &terms());

    assert_eq!(report.markers_created, 1);
    let marker = persistent_markers(&tree)[0];
    assert_eq!(tree.parent(&marker), Some(ok));
}

#[test]
fn test_scan_leaves_nodes_near_ephemeral_bubbles() {
    let (mut tree, p, t) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();
    let body = tree.root();

    engine.insert_ephemeral_bubble(&mut tree, &snapshot(t, 4, 10, "effect")).unwrap();
    let report = engine.scan(&mut tree, &body, &terms());

    assert_eq!(report.markers_created, 0);
    assert_eq!(engine.bubble_count(BubbleKind::Ephemeral), 1);
    assert!(tree.text_content(&p).starts_with("the effect"));
}

#[test]
fn test_scan_under_subtree_only() {
    let mut tree = MemoryTree::new();
    let body = tree.root();
    let a = tree.add_element(&body, "section");
    tree.add_text(&a, "ephemeral in section a");
    let b = tree.add_element(&body, "section");
    tree.add_text(&b, "ephemeral in section b");

    let mut engine = AnnotationEngine::default();
    engine.scan(&mut tree, &a, &terms());

    let markers = persistent_markers(&tree);
    assert_eq!(markers.len(), 1);
    assert!(tree.contains(&a, &markers[0]));
}

// ============================================================================
// Ephemeral bubbles
// ============================================================================

#[test]
fn test_ephemeral_split_preserves_text() {
    let (mut tree, p, t) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();

    let id = engine
        .insert_ephemeral_bubble(&mut tree, &snapshot(t, 15, 24, "ephemeral"))
        .unwrap();

    let children = tree.children(&p);
    assert_eq!(children.len(), 3);
    assert_eq!(tree.text(&children[0]).as_deref(), Some("the effect was ephemeral"));
    assert_eq!(marker_kind(&tree, &children[1]), Some(BubbleKind::Ephemeral));
    assert_eq!(tree.text(&children[2]).as_deref(), Some(" and brief"));
    assert_eq!(stripped_text(&tree, &p), SENTENCE);
    assert_eq!(engine.bubble(id).unwrap().content, Some(BubbleContent::Loading));
    assert_eq!(tree.attribute(&children[1], ATTR_STATE).as_deref(), Some("loading"));
}

#[test]
fn test_ephemeral_falls_back_to_element_then_root() {
    let mut tree = MemoryTree::new();
    let body = tree.root();
    let p = tree.add_element(&body, "p");
    tree.add_text(&p, "text");
    let mut engine = AnnotationEngine::default();

    let on_element = snapshot(p, 0, 1, "text");
    let id = engine.insert_ephemeral_bubble(&mut tree, &on_element).unwrap();
    let node = engine.bubble(id).unwrap().node;
    assert_eq!(tree.parent(&node), Some(p));
    assert_eq!(tree.children(&p).last(), Some(&node));

    let orphan = tree.create_text("floating").unwrap();
    let id = engine
        .insert_ephemeral_bubble(&mut tree, &snapshot(orphan, 0, 8, "floating"))
        .unwrap();
    let node = engine.bubble(id).unwrap().node;
    assert_eq!(tree.parent(&node), Some(body));
}

#[test]
fn test_bad_split_offset_falls_back_to_parent() {
    let (mut tree, p, t) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();

    let id = engine
        .insert_ephemeral_bubble(&mut tree, &snapshot(t, 0, 999, "whatever"))
        .unwrap();

    let node = engine.bubble(id).unwrap().node;
    assert_eq!(tree.children(&p), vec![t, node]);
    assert_eq!(tree.text(&t).as_deref(), Some(SENTENCE));
}

#[test]
fn test_update_bubble_renders_result() {
    let (mut tree, _, t) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();
    let id = engine
        .insert_ephemeral_bubble(&mut tree, &snapshot(t, 15, 24, "ephemeral"))
        .unwrap();

    let resolved = BubbleContent::Resolved {
        translation: "短暂的".to_string(),
        phonetic: "/ɪˈfem(ə)rəl/".to_string(),
        explanation: "lasting a very short time".to_string(),
    };
    assert!(engine.update_bubble(&mut tree, id, resolved.clone()));

    let node = engine.bubble(id).unwrap().node;
    assert_eq!(tree.attribute(&node, ATTR_STATE).as_deref(), Some("resolved"));
    assert_eq!(tree.text_content(&node), "短暂的/ɪˈfem(ə)rəl/");
    assert_eq!(tree.attribute(&node, "title").as_deref(), Some("lasting a very short time"));
    assert_eq!(engine.bubble(id).unwrap().content, Some(resolved));
}

#[test]
fn test_late_update_is_dropped() {
    let (mut tree, _, t) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();
    let id = engine
        .insert_ephemeral_bubble(&mut tree, &snapshot(t, 15, 24, "ephemeral"))
        .unwrap();
    engine.remove_bubble(&mut tree, Some(id));

    let content = BubbleContent::Failed { message: "late".to_string() };
    assert!(!engine.update_bubble(&mut tree, id, content.clone()));
    assert!(!engine.update_bubble(&mut tree, BubbleId(999), content));
}

#[test]
fn test_update_of_externally_detached_bubble_is_dropped() {
    let (mut tree, _, t) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();
    let id = engine
        .insert_ephemeral_bubble(&mut tree, &snapshot(t, 15, 24, "ephemeral"))
        .unwrap();
    let node = engine.bubble(id).unwrap().node;
    tree.remove(&node).unwrap();

    assert!(!engine.update_bubble(&mut tree, id, BubbleContent::Loading));
    assert!(engine.bubble(id).is_none());
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn test_remove_bubble_never_touches_persistent() {
    let (mut tree, p, _) = page(SENTENCE);
    let body = tree.root();
    let mut engine = AnnotationEngine::default();
    engine.scan(&mut tree, &body, &terms());
    let persistent = engine.persistent_ids()[0];

    let first = tree.children(&p)[0];
    engine.insert_ephemeral_bubble(&mut tree, &snapshot(first, 4, 10, "effect")).unwrap();
    engine.insert_ephemeral_bubble(&mut tree, &snapshot(first, 0, 3, "the")).unwrap();

    assert_eq!(engine.remove_bubble(&mut tree, Some(persistent)), 0);
    assert_eq!(engine.remove_bubble(&mut tree, None), 2);

    assert_eq!(engine.bubble_count(BubbleKind::Ephemeral), 0);
    assert_eq!(engine.bubble_count(BubbleKind::Persistent), 1);
    assert_eq!(persistent_markers(&tree).len(), 1);
    assert_eq!(stripped_text(&tree, &p), SENTENCE);
}

#[test]
fn test_remove_single_bubble_normalizes_parent() {
    let (mut tree, p, t) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();
    let id = engine
        .insert_ephemeral_bubble(&mut tree, &snapshot(t, 15, 24, "ephemeral"))
        .unwrap();

    assert_eq!(engine.remove_bubble(&mut tree, Some(id)), 1);
    assert_eq!(tree.markup(&p), format!("<p>{}</p>", SENTENCE));
    assert_eq!(engine.remove_bubble(&mut tree, Some(id)), 0);
}

// ============================================================================
// Deduplication
// ============================================================================

#[test]
fn test_find_nearby_persistent_bubble_highlights() {
    let (mut tree, p, _) = page(SENTENCE);
    let body = tree.root();
    let mut engine = AnnotationEngine::default();
    engine.scan(&mut tree, &body, &terms());
    let leading = tree.children(&p)[0];
    let range = snapshot(leading, 0, 3, "the").range;

    let found = engine.find_nearby_persistent_bubble(&mut tree, &range, "  EPHEMERAL ");

    assert_eq!(found, Some(engine.persistent_ids()[0]));
    let marker = persistent_markers(&tree)[0];
    assert_eq!(tree.attribute(&marker, ATTR_HIGHLIGHT).as_deref(), Some("true"));

    engine.clear_highlights(&mut tree);
    assert_eq!(tree.attribute(&marker, ATTR_HIGHLIGHT), None);
}

#[test]
fn test_find_nearby_inside_marker_and_misses() {
    let (mut tree, p, _) = page(SENTENCE);
    let body = tree.root();
    let mut engine = AnnotationEngine::default();
    engine.scan(&mut tree, &body, &terms());
    let marker = persistent_markers(&tree)[0];
    let inner = tree.children(&marker)[0];

    let inside = snapshot(inner, 0, 9, "ephemeral").range;
    assert!(engine.find_nearby_persistent_bubble(&mut tree, &inside, "ephemeral").is_some());

    let leading = tree.children(&p)[0];
    let range = snapshot(leading, 0, 3, "the").range;
    assert_eq!(engine.find_nearby_persistent_bubble(&mut tree, &range, "brief"), None);
    assert_eq!(engine.find_nearby_persistent_bubble(&mut tree, &range, "   "), None);
}

#[test]
fn test_find_nearby_is_scoped_to_the_element() {
    let mut tree = MemoryTree::new();
    let body = tree.root();
    let a = tree.add_element(&body, "p");
    tree.add_text(&a, "an ephemeral word");
    let b = tree.add_element(&body, "p");
    let other = tree.add_text(&b, "unrelated sentence here");
    let mut engine = AnnotationEngine::default();
    engine.scan(&mut tree, &body, &terms());

    let range = snapshot(other, 0, 9, "unrelated").range;
    assert_eq!(engine.find_nearby_persistent_bubble(&mut tree, &range, "ephemeral"), None);
}

// ============================================================================
// Pronunciation hint
// ============================================================================

#[test]
fn test_pronunciation_replaces_and_clears() {
    let (mut tree, p, t) = page(SENTENCE);
    let mut engine = AnnotationEngine::default();
    let snap = snapshot(t, 15, 24, "ephemeral");

    engine.show_pronunciation(&mut tree, &snap, "/ɪˈfem(ə)rəl/").unwrap();
    engine.show_pronunciation(&mut tree, &snap, "/ɪˈfem(ə)rəl/").unwrap();
    assert_eq!(engine.bubble_count(BubbleKind::Pronunciation), 1);

    assert_eq!(engine.remove_pronunciation(&mut tree), 1);
    assert_eq!(tree.markup(&p), format!("<p>{}</p>", SENTENCE));
}
