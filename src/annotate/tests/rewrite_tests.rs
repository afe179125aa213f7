//! Tests for rewrite planning on matcher output
//!
//! Plans are checked against the original string: joining every fragment's
//! source text must give back the node text unchanged.

use crate::annotate::bubble::TermEntry;
use crate::annotate::matcher::TermMatcher;
use crate::annotate::rewrite::{plan_rewrite, Fragment};

fn dictionary(terms: &[(&str, &str)]) -> TermMatcher {
    let entries: Vec<TermEntry> = terms.iter().map(|(t, l)| TermEntry::new(*t, *l)).collect();
    TermMatcher::new(&entries)
}

fn joined(plan: &[Fragment]) -> String {
    plan.iter().map(Fragment::source_text).collect()
}

fn marker_texts(plan: &[Fragment]) -> Vec<&str> {
    plan.iter()
        .filter_map(|f| match f {
            Fragment::Marker(m) => Some(m.matched_text.as_str()),
            Fragment::Text(_) => None,
        })
        .collect()
}

// ============================================================================
// Shape
// ============================================================================

#[test]
fn test_single_term_in_sentence() {
    let matcher = dictionary(&[("ephemeral", "短暂的")]);
    let text = "the effect was ephemeral and brief";
    let plan = plan_rewrite(text, &matcher.find_matches(text));

    assert_eq!(plan.len(), 3);
    assert_eq!(plan[0], Fragment::Text("the effect was ".to_string()));
    assert_eq!(marker_texts(&plan), vec!["ephemeral"]);
    assert_eq!(plan[2], Fragment::Text(" and brief".to_string()));
}

#[test]
fn test_adjacent_markers_have_no_empty_text_between() {
    let matcher = dictionary(&[("salt", ""), ("pepper", "")]);
    let text = "salt pepper";
    let plan = plan_rewrite(text, &matcher.find_matches(text));

    assert_eq!(plan.len(), 3);
    assert_eq!(plan[1], Fragment::Text(" ".to_string()));
}

#[test]
fn test_marker_keeps_document_casing() {
    let matcher = dictionary(&[("cat", "猫")]);
    let text = "A CAT and a Cat";
    let plan = plan_rewrite(text, &matcher.find_matches(text));
    assert_eq!(marker_texts(&plan), vec!["CAT", "Cat"]);
}

// ============================================================================
// Round trip of unmatched content
// ============================================================================

#[test]
fn test_round_trip_reproduces_original() {
    let matcher = dictionary(&[
        ("ephemeral", ""),
        ("New York", ""),
        ("C++", ""),
        ("café", ""),
        ("a.b", ""),
    ]);
    let texts = [
        "the effect was ephemeral and brief",
        "Ephemeral! New York, new york and NEW YORK.",
        "C++ code in a.b at the Café (café) ephemeral",
        "nothing to see here",
        "ephemeral",
        "    spaced     ephemeral    ",
        "ünïcödé ephemeral ünïcödé",
    ];
    for text in texts {
        let plan = plan_rewrite(text, &matcher.find_matches(text));
        assert_eq!(joined(&plan), text, "round trip failed for {:?}", text);
    }
}

#[test]
fn test_overlapping_terms_are_resolved_before_planning() {
    let matcher = dictionary(&[("York", ""), ("New York", ""), ("New York City", "")]);
    let text = "New York City is not York";
    let plan = plan_rewrite(text, &matcher.find_matches(text));

    assert_eq!(marker_texts(&plan), vec!["New York City", "York"]);
    assert_eq!(joined(&plan), text);
}

#[test]
fn test_raw_overlapping_matches_still_round_trip() {
    // Unresolved input: the planner itself drops what it cannot place
    let matcher = dictionary(&[("York", ""), ("New York", "")]);
    let text = "in New York";
    let plan = plan_rewrite(text, &matcher.find_all(text));

    assert_eq!(joined(&plan), text);
    assert_eq!(plan.iter().filter(|f| f.is_marker()).count(), 1);
}
