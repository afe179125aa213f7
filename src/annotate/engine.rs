//! AnnotationEngine: scans and bubble lifecycle over a DocumentTree
//!
//! # Scan
//! 1. Remove every persistent marker under the root, restoring its text
//! 2. Collect the text nodes the [`NodeFilter`] accepts
//! 3. Plan each node's rewrite against the compiled [`TermMatcher`]
//! 4. Substitute the node with its fragments in one `replace_with`
//!
//! Candidate collection finishes before any rewrite so the walk never sees
//! nodes it produced itself.

use serde::{Deserialize, Serialize};

use super::bubble::{
    marker_id, marker_kind, BubbleContent, BubbleId, BubbleKind, BubbleRecord, BubbleRegistry,
    MarkerRenderer, TermEntry, ATTR_HIGHLIGHT, ATTR_TERM,
};
use super::filter::{MarkedElements, NodeFilter};
use super::matcher::TermMatcher;
use super::rewrite::{plan_rewrite, Fragment};
use crate::config::AnnotatorConfig;
use crate::dom::{DocumentTree, DomError, TextRange};
use crate::error::BubbleError;
use crate::gesture::SelectionSnapshot;

// =============================================================================
// Types
// =============================================================================

/// Outcome of one scan pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Text nodes reached by the walk
    pub nodes_visited: usize,
    /// Text nodes replaced by fragments
    pub nodes_rewritten: usize,
    pub markers_created: usize,
    /// Persistent markers removed before matching
    pub markers_removed: usize,
    pub elapsed_us: u64,
}

/// Owns the bubble registry for one document
pub struct AnnotationEngine<N> {
    config: AnnotatorConfig,
    filter: NodeFilter,
    registry: BubbleRegistry<N>,
}

impl<N: Clone + PartialEq> Default for AnnotationEngine<N> {
    fn default() -> Self {
        Self::new(AnnotatorConfig::default())
    }
}

impl<N: Clone + PartialEq> AnnotationEngine<N> {
    pub fn new(config: AnnotatorConfig) -> Self {
        let filter = NodeFilter::new(&config);
        Self {
            config,
            filter,
            registry: BubbleRegistry::new(),
        }
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn filter(&self) -> &NodeFilter {
        &self.filter
    }

    pub fn bubble(&self, id: BubbleId) -> Option<&BubbleRecord<N>> {
        self.registry.get(id)
    }

    pub fn bubble_count(&self, kind: BubbleKind) -> usize {
        self.registry.count(kind)
    }

    pub fn ephemeral_ids(&self) -> Vec<BubbleId> {
        self.registry.ids(BubbleKind::Ephemeral)
    }

    pub fn persistent_ids(&self) -> Vec<BubbleId> {
        self.registry.ids(BubbleKind::Persistent)
    }

    // =========================================================================
    // Scan
    // =========================================================================

    /// Re-annotate everything under `root` with `terms`
    pub fn scan<T>(&mut self, tree: &mut T, root: &N, terms: &[TermEntry]) -> ScanReport
    where
        T: DocumentTree<Node = N>,
    {
        let start = instant::Instant::now();
        let mut report = ScanReport {
            markers_removed: self.remove_persistent(tree, root),
            ..Default::default()
        };

        let matcher = TermMatcher::new(terms);
        if matcher.is_empty() {
            report.elapsed_us = start.elapsed().as_micros() as u64;
            return report;
        }

        let (visited, candidates) = self.collect_candidates(tree, root);
        report.nodes_visited = visited;

        for node in candidates {
            let Some(text) = tree.text(&node) else {
                continue;
            };
            let matches = matcher.find_matches(&text);
            if matches.is_empty() {
                continue;
            }
            let plan = plan_rewrite(&text, &matches);
            match self.apply_plan(tree, &node, &plan, &matcher) {
                Ok(created) => {
                    report.nodes_rewritten += 1;
                    report.markers_created += created;
                }
                Err(e) => {
                    console_warn!("[AnnotationEngine] Left text node untouched: {}", e);
                }
            }
        }

        report.elapsed_us = start.elapsed().as_micros() as u64;
        console_log!(
            "[AnnotationEngine] Scan: {} visited, {} rewritten, {} markers ({} removed) in {}us",
            report.nodes_visited,
            report.nodes_rewritten,
            report.markers_created,
            report.markers_removed,
            report.elapsed_us
        );
        report
    }

    /// Remove every persistent marker under `root`, putting its text back
    pub fn remove_persistent<T>(&mut self, tree: &mut T, root: &N) -> usize
    where
        T: DocumentTree<Node = N>,
    {
        let markers: Vec<N> = tree
            .descendants(root)
            .into_iter()
            .filter(|n| marker_kind(tree, n) == Some(BubbleKind::Persistent))
            .collect();

        let mut parents: Vec<N> = Vec::new();
        let mut removed = 0;
        for marker in &markers {
            // A marker nested in one already removed is detached with it
            let Some(parent) = tree.parent(marker) else {
                continue;
            };
            if !tree.contains(root, &parent) {
                continue;
            }
            let covered = tree
                .attribute(marker, ATTR_TERM)
                .or_else(|| tree.children(marker).first().and_then(|c| tree.text(c)))
                .unwrap_or_default();
            let restored = tree
                .create_text(&covered)
                .and_then(|text| tree.replace_with(marker, &[text]));
            match restored {
                Ok(()) => {
                    removed += 1;
                    if !parents.contains(&parent) {
                        parents.push(parent);
                    }
                }
                Err(e) => console_warn!("[AnnotationEngine] Could not remove persistent marker: {}", e),
            }
        }

        for parent in &parents {
            if let Err(e) = tree.normalize(parent) {
                console_warn!("[AnnotationEngine] Normalize failed: {}", e);
            }
        }

        self.registry
            .retain(|r| r.kind != BubbleKind::Persistent || (tree.parent(&r.node).is_some() && !markers.contains(&r.node)));
        removed
    }

    fn collect_candidates<T>(&self, tree: &T, root: &N) -> (usize, Vec<N>)
    where
        T: DocumentTree<Node = N>,
    {
        let marked = MarkedElements::collect(tree, root);
        let mut visited = 0;
        let mut out = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if tree.is_text(&node) {
                visited += 1;
                if self.filter.should_process_within(tree, &node, &marked) {
                    out.push(node);
                }
                continue;
            }
            if !tree.is_element(&node) || !self.filter.should_descend(tree, &node) {
                continue;
            }
            stack.extend(tree.children(&node).into_iter().rev());
        }
        (visited, out)
    }

    /// Build the fragments for one node and swap them in; returns marker count
    fn apply_plan<T>(
        &mut self,
        tree: &mut T,
        node: &N,
        plan: &[Fragment],
        matcher: &TermMatcher,
    ) -> Result<usize, DomError>
    where
        T: DocumentTree<Node = N>,
    {
        let renderer = MarkerRenderer::new(&self.config);
        let mut nodes = Vec::with_capacity(plan.len());
        let mut records = Vec::new();

        for fragment in plan {
            match fragment {
                Fragment::Text(text) => nodes.push(tree.create_text(text)?),
                Fragment::Marker(m) => {
                    let Some(entry) = matcher.entry(m.entry) else {
                        nodes.push(tree.create_text(&m.matched_text)?);
                        continue;
                    };
                    let id = self.registry.next_id();
                    let marker = renderer.persistent(tree, id, &m.matched_text, entry)?;
                    records.push(BubbleRecord {
                        id,
                        kind: BubbleKind::Persistent,
                        node: marker.clone(),
                        text: m.matched_text.clone(),
                        content: None,
                    });
                    nodes.push(marker);
                }
            }
        }

        tree.replace_with(node, &nodes)?;
        let created = records.len();
        for record in records {
            self.registry.insert(record);
        }
        Ok(created)
    }

    // =========================================================================
    // Ephemeral bubbles
    // =========================================================================

    /// Insert a loading bubble right after the snapshot's selection
    pub fn insert_ephemeral_bubble<T>(
        &mut self,
        tree: &mut T,
        snapshot: &SelectionSnapshot<N>,
    ) -> Result<BubbleId, BubbleError>
    where
        T: DocumentTree<Node = N>,
    {
        self.insert_ephemeral(tree, snapshot, BubbleContent::Loading)
    }

    /// Insert an ephemeral bubble already showing `content`
    pub fn insert_ephemeral<T>(
        &mut self,
        tree: &mut T,
        snapshot: &SelectionSnapshot<N>,
        content: BubbleContent,
    ) -> Result<BubbleId, BubbleError>
    where
        T: DocumentTree<Node = N>,
    {
        let id = self.registry.next_id();
        let marker = MarkerRenderer::new(&self.config).ephemeral(tree, id, &snapshot.text, &content)?;
        place_after_range(tree, &snapshot.range, &marker)?;
        self.registry.insert(BubbleRecord {
            id,
            kind: BubbleKind::Ephemeral,
            node: marker,
            text: snapshot.text.clone(),
            content: Some(content),
        });
        Ok(id)
    }

    /// Re-render an ephemeral bubble; false when it no longer exists
    pub fn update_bubble<T>(&mut self, tree: &mut T, id: BubbleId, content: BubbleContent) -> bool
    where
        T: DocumentTree<Node = N>,
    {
        let Some(record) = self.registry.get(id) else {
            console_log!("[AnnotationEngine] Dropping update for missing {}", id);
            return false;
        };
        if record.kind != BubbleKind::Ephemeral {
            return false;
        }
        if tree.parent(&record.node).is_none() {
            console_log!("[AnnotationEngine] Dropping update for detached {}", id);
            self.registry.remove(id);
            return false;
        }

        let node = record.node.clone();
        if let Err(e) = MarkerRenderer::new(&self.config).refill(tree, &node, &content) {
            console_warn!("[AnnotationEngine] Could not update {}: {}", id, e);
            return false;
        }
        if let Some(record) = self.registry.get_mut(id) {
            record.content = Some(content);
        }
        true
    }

    /// Remove one ephemeral bubble, or all of them; returns how many went
    ///
    /// Persistent bubbles are never touched here.
    pub fn remove_bubble<T>(&mut self, tree: &mut T, id: Option<BubbleId>) -> usize
    where
        T: DocumentTree<Node = N>,
    {
        let targets = match id {
            Some(id) => match self.registry.get(id) {
                Some(r) if r.kind == BubbleKind::Ephemeral => vec![id],
                _ => Vec::new(),
            },
            None => self.registry.ids(BubbleKind::Ephemeral),
        };
        targets
            .into_iter()
            .filter(|id| self.detach_record(tree, *id))
            .count()
    }

    fn detach_record<T>(&mut self, tree: &mut T, id: BubbleId) -> bool
    where
        T: DocumentTree<Node = N>,
    {
        let Some(record) = self.registry.remove(id) else {
            return false;
        };
        let parent = tree.parent(&record.node);
        if let Err(e) = tree.remove(&record.node) {
            console_warn!("[AnnotationEngine] Could not remove {}: {}", id, e);
        }
        if let Some(parent) = parent {
            if let Err(e) = tree.normalize(&parent) {
                console_warn!("[AnnotationEngine] Normalize failed: {}", e);
            }
        }
        true
    }

    // =========================================================================
    // Deduplication
    // =========================================================================

    /// A persistent bubble near `range` that already annotates `text`
    ///
    /// When one is found it is flagged with the highlight attribute.
    pub fn find_nearby_persistent_bubble<T>(
        &self,
        tree: &mut T,
        range: &TextRange<N>,
        text: &str,
    ) -> Option<BubbleId>
    where
        T: DocumentTree<Node = N>,
    {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let found = enclosing_persistent(tree, range.anchor())
            .or_else(|| {
                let scope = tree.nearest_element(range.anchor())?;
                let scope = if marker_kind(tree, &scope).is_some() { tree.parent(&scope)? } else { scope };
                tree.descendants(&scope)
                    .into_iter()
                    .filter(|n| marker_kind(tree, n) == Some(BubbleKind::Persistent))
                    .find(|marker| annotates(tree, marker, &needle))
            })?;

        if let Err(e) = tree.set_attribute(&found, ATTR_HIGHLIGHT, "true") {
            console_warn!("[AnnotationEngine] Could not highlight bubble: {}", e);
        }
        marker_id(tree, &found)
    }

    /// Drop the highlight flag from every persistent bubble
    pub fn clear_highlights<T>(&self, tree: &mut T)
    where
        T: DocumentTree<Node = N>,
    {
        for record in self.registry.iter().filter(|r| r.kind == BubbleKind::Persistent) {
            if tree.attribute(&record.node, ATTR_HIGHLIGHT).is_some() {
                let _ = tree.remove_attribute(&record.node, ATTR_HIGHLIGHT);
            }
        }
    }

    // =========================================================================
    // Pronunciation hint
    // =========================================================================

    /// Show `phonetic` right after the snapshot's selection
    pub fn show_pronunciation<T>(
        &mut self,
        tree: &mut T,
        snapshot: &SelectionSnapshot<N>,
        phonetic: &str,
    ) -> Result<BubbleId, BubbleError>
    where
        T: DocumentTree<Node = N>,
    {
        self.remove_pronunciation(tree);
        let id = self.registry.next_id();
        let marker = MarkerRenderer::new(&self.config).pronunciation(tree, id, phonetic)?;
        place_after_range(tree, &snapshot.range, &marker)?;
        self.registry.insert(BubbleRecord {
            id,
            kind: BubbleKind::Pronunciation,
            node: marker,
            text: snapshot.text.clone(),
            content: None,
        });
        Ok(id)
    }

    pub fn remove_pronunciation<T>(&mut self, tree: &mut T) -> usize
    where
        T: DocumentTree<Node = N>,
    {
        self.registry
            .ids(BubbleKind::Pronunciation)
            .into_iter()
            .filter(|id| self.detach_record(tree, *id))
            .count()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Insert `marker` right after the end of `range`
///
/// Splits the end text node when possible, then falls back to the nearest
/// element and finally the document root.
fn place_after_range<T: DocumentTree>(
    tree: &mut T,
    range: &TextRange<T::Node>,
    marker: &T::Node,
) -> Result<(), BubbleError> {
    let end = &range.end_container;

    if tree.is_text(end) {
        if let Some(parent) = tree.parent(end) {
            match tree.split_text(end, range.end_offset) {
                Ok(tail) => match tree.insert_before(&parent, marker, Some(&tail)) {
                    Ok(()) => return Ok(()),
                    Err(e) => console_warn!("[AnnotationEngine] Insert after split failed: {}", e),
                },
                Err(e) => console_warn!("[AnnotationEngine] Split failed: {}", e),
            }
        }
    }

    if let Some(element) = tree.nearest_element(end) {
        if tree.parent(&element).is_some() || element == tree.root() {
            match tree.append_child(&element, marker) {
                Ok(()) => return Ok(()),
                Err(e) => console_warn!("[AnnotationEngine] Append to element failed: {}", e),
            }
        }
    }

    let root = tree.root();
    tree.append_child(&root, marker).map_err(|e| {
        console_error!("[AnnotationEngine] No insertion point for bubble: {}", e);
        BubbleError::from(e)
    })
}

/// The persistent marker containing `node`, if any
fn enclosing_persistent<T: DocumentTree>(tree: &T, node: &T::Node) -> Option<T::Node> {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if marker_kind(tree, &n) == Some(BubbleKind::Persistent) {
            return Some(n);
        }
        current = tree.parent(&n);
    }
    None
}

/// Marker covers `needle`, or the text right before it ends with `needle`
fn annotates<T: DocumentTree>(tree: &T, marker: &T::Node, needle: &str) -> bool {
    let covered = tree.attribute(marker, ATTR_TERM).unwrap_or_default().to_lowercase();
    if !covered.is_empty() && covered.contains(needle) {
        return true;
    }
    tree.previous_sibling(marker)
        .and_then(|prev| tree.text(&prev))
        .map(|t| t.trim().to_lowercase().ends_with(needle))
        .unwrap_or(false)
}
