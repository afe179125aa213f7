//! Rewrite planning for a single text node
//!
//! A plan is computed over an immutable offset list before any tree
//! mutation happens. Matches are walked from the rightmost start leftwards,
//! so every cut uses offsets of the untouched original string.

use super::matcher::TermMatch;

/// One piece of the replacement for a text node
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Marker(TermMatch),
}

impl Fragment {
    /// The original text this fragment covers
    pub fn source_text(&self) -> &str {
        match self {
            Fragment::Text(t) => t,
            Fragment::Marker(m) => &m.matched_text,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Fragment::Marker(_))
    }
}

/// Split `text` into plain and marker fragments in document order
///
/// Matches that fall outside the text, are empty, cut inside a character, or
/// overlap a match already placed to their right are skipped. Empty text
/// fragments are never emitted.
pub fn plan_rewrite(text: &str, matches: &[TermMatch]) -> Vec<Fragment> {
    let mut ordered: Vec<&TermMatch> = matches.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

    let mut reversed = Vec::with_capacity(ordered.len() * 2 + 1);
    let mut cut = text.len();

    for m in ordered {
        if m.start >= m.end || m.end > cut {
            continue;
        }
        if !text.is_char_boundary(m.start) || !text.is_char_boundary(m.end) {
            continue;
        }
        if m.end < cut {
            reversed.push(Fragment::Text(text[m.end..cut].to_string()));
        }
        let mut marker = m.clone();
        marker.matched_text = text[m.start..m.end].to_string();
        reversed.push(Fragment::Marker(marker));
        cut = m.start;
    }

    if cut > 0 {
        reversed.push(Fragment::Text(text[..cut].to_string()));
    }
    reversed.reverse();
    reversed
}
