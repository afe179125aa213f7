//! Session orchestration
//!
//! [`Annotator`] owns one document tree together with the gesture resolver,
//! the annotation engine and a cached vocabulary. Everything on it runs
//! synchronously inside one event-loop turn. Lookups are split into
//! `begin_lookup` / `finish_lookup` so a host can await the remote call
//! in between without holding any borrow.
//!
//! [`BubbleContext`] is the explicitly constructed context that wires an
//! annotator to its collaborators: persistence, the lookup service and the
//! change broadcaster.

use crate::annotate::{AnnotationEngine, BubbleContent, BubbleId, BubbleKind, ScanReport};
use crate::config::AnnotatorConfig;
use crate::dom::{DocumentTree, Point};
use crate::error::BubbleError;
use crate::gesture::{GestureEffect, GestureResolver, GestureState, SelectionSnapshot, TimerToken};
use crate::lookup::{lookup_context, parse_lookup_payload, LookupRequest, LookupService};
use crate::notify::{Broadcaster, ChangeNotice};
use crate::vocab::{KeyValueStore, Settings, Vocabulary, VocabularyEntry, VocabularyStore};

// =============================================================================
// Types
// =============================================================================

/// A lookup waiting for the remote answer
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLookup {
    /// The loading bubble the answer goes into
    pub bubble: BubbleId,
    pub request: LookupRequest,
}

/// How an activation was handled
#[derive(Debug, Clone, PartialEq)]
pub enum LookupStart {
    /// The word is already annotated nearby; that bubble got highlighted
    HighlightExisting(BubbleId),
    /// Nothing to look up; the error is shown inline when a bubble exists
    Failed {
        bubble: Option<BubbleId>,
        error: BubbleError,
    },
    /// A loading bubble is in place; run `request` and call `finish_lookup`
    Pending(PendingLookup),
}

// =============================================================================
// Annotator
// =============================================================================

/// Gesture handling and bubble lifecycle for one document
pub struct Annotator<T: DocumentTree> {
    tree: T,
    config: AnnotatorConfig,
    resolver: GestureResolver<T::Node>,
    engine: AnnotationEngine<T::Node>,
    vocabulary: Vocabulary,
    pending: Vec<PendingLookup>,
}

impl<T: DocumentTree> Annotator<T> {
    pub fn new(tree: T, config: AnnotatorConfig) -> Self {
        Self {
            resolver: GestureResolver::new(&config),
            engine: AnnotationEngine::new(config.clone()),
            tree,
            config,
            vocabulary: Vocabulary::new(),
            pending: Vec::new(),
        }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn engine(&self) -> &AnnotationEngine<T::Node> {
        &self.engine
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn gesture_state(&self) -> GestureState {
        self.resolver.state()
    }

    /// Live ephemeral bubbles
    pub fn bubble_count(&self) -> usize {
        self.engine.bubble_count(BubbleKind::Ephemeral)
    }

    // ---- gestures ----

    pub fn handle_double_click(&mut self) -> Vec<GestureEffect<T::Node>> {
        let selection = self.tree.selection();
        let effects = self.resolver.on_double_click(selection);
        self.apply_effects(&effects);
        effects
    }

    pub fn handle_selection_change(&mut self) -> Vec<GestureEffect<T::Node>> {
        let live = self.tree.selection().map(|s| s.text);
        let effects = self.resolver.on_selection_change(live.as_deref());
        self.apply_effects(&effects);
        effects
    }

    pub fn handle_timer(&mut self, token: TimerToken) -> Vec<GestureEffect<T::Node>> {
        let live = self.tree.selection().map(|s| s.text);
        let effects = self.resolver.on_timer(token, live.as_deref());
        self.apply_effects(&effects);
        effects
    }

    pub fn handle_click(&mut self, point: Point) -> Vec<GestureEffect<T::Node>> {
        let effects = self.resolver.on_click(&self.tree, point);
        self.apply_effects(&effects);
        effects
    }

    /// Effects the annotator applies to the tree itself
    fn apply_effects(&mut self, effects: &[GestureEffect<T::Node>]) {
        for effect in effects {
            match effect {
                GestureEffect::ClearPronunciation => {
                    self.engine.remove_pronunciation(&mut self.tree);
                }
                GestureEffect::Ready => self.show_pronunciation(),
                _ => {}
            }
        }
    }

    fn show_pronunciation(&mut self) {
        let Some(snapshot) = self.resolver.snapshot() else {
            return;
        };
        let Some(phonetic) = self
            .vocabulary
            .find(&snapshot.text)
            .map(|e| e.phonetic.trim().to_string())
            .filter(|p| !p.is_empty())
        else {
            return;
        };
        let snapshot = snapshot.clone();
        if let Err(e) = self.engine.show_pronunciation(&mut self.tree, &snapshot, &phonetic) {
            console_warn!("[Annotator] Pronunciation hint skipped: {}", e);
        }
    }

    // ---- lookups ----

    /// Start the lookup for an activated snapshot
    pub fn begin_lookup(&mut self, snapshot: &SelectionSnapshot<T::Node>, credential: Option<&str>) -> LookupStart {
        self.engine.clear_highlights(&mut self.tree);

        if let Some(existing) =
            self.engine
                .find_nearby_persistent_bubble(&mut self.tree, &snapshot.range, &snapshot.text)
        {
            return LookupStart::HighlightExisting(existing);
        }

        if credential.map(str::trim).filter(|c| !c.is_empty()).is_none() {
            let error = BubbleError::MissingCredential;
            let content = BubbleContent::Failed { message: error.user_message() };
            let bubble = self
                .engine
                .insert_ephemeral(&mut self.tree, snapshot, content)
                .map_err(|e| console_error!("[Annotator] Could not show error bubble: {}", e))
                .ok();
            return LookupStart::Failed { bubble, error };
        }

        let context = lookup_context(&self.tree, snapshot, self.config.context_max_chars);
        match self.engine.insert_ephemeral_bubble(&mut self.tree, snapshot) {
            Ok(bubble) => {
                let pending = PendingLookup {
                    bubble,
                    request: LookupRequest::new(snapshot.text.clone(), context),
                };
                self.pending.push(pending.clone());
                LookupStart::Pending(pending)
            }
            Err(error) => LookupStart::Failed { bubble: None, error },
        }
    }

    /// Feed a lookup answer into its bubble
    ///
    /// Returns the vocabulary entry to persist on success. A result for a
    /// bubble that is already gone is dropped.
    pub fn finish_lookup(&mut self, bubble: BubbleId, outcome: Result<String, BubbleError>) -> Option<VocabularyEntry> {
        let Some(idx) = self.pending.iter().position(|p| p.bubble == bubble) else {
            console_log!("[Annotator] Dropping result for unknown {}", bubble);
            return None;
        };
        let pending = self.pending.remove(idx);
        if self.engine.bubble(bubble).is_none() {
            console_log!("[Annotator] Dropping late result for {}", bubble);
            return None;
        }

        let result = match outcome {
            Ok(raw) => parse_lookup_payload(&raw, &pending.request.text),
            Err(error) => {
                console_warn!("[Annotator] Lookup failed: {}", error);
                let content = BubbleContent::Failed { message: error.user_message() };
                self.engine.update_bubble(&mut self.tree, bubble, content);
                return None;
            }
        };

        if result.translation.trim().is_empty() {
            let error = BubbleError::MalformedResult("empty translation".to_string());
            let content = BubbleContent::Failed { message: error.user_message() };
            self.engine.update_bubble(&mut self.tree, bubble, content);
            return None;
        }

        if !self.engine.update_bubble(&mut self.tree, bubble, result.to_content()) {
            return None;
        }
        Some(VocabularyEntry::from_lookup(&result, &pending.request.context))
    }

    // ---- vocabulary and scans ----

    /// Replace the cached vocabulary without touching the document
    pub fn set_vocabulary(&mut self, vocabulary: Vocabulary) {
        self.vocabulary = vocabulary;
    }

    /// Replace the cached vocabulary and rescan
    pub fn apply_vocabulary(&mut self, vocabulary: Vocabulary) -> ScanReport {
        self.set_vocabulary(vocabulary);
        self.rescan()
    }

    /// Rebuild every persistent bubble from the cached vocabulary
    pub fn rescan(&mut self) -> ScanReport {
        let root = self.tree.root();
        if !self.config.auto_annotate {
            return ScanReport {
                markers_removed: self.engine.remove_persistent(&mut self.tree, &root),
                ..Default::default()
            };
        }
        let terms = self.vocabulary.term_entries();
        self.engine.scan(&mut self.tree, &root, &terms)
    }

    /// Remove a finished ephemeral bubble and let the scan take over
    pub fn consume_bubble(&mut self, bubble: BubbleId) -> Option<ScanReport> {
        if self.engine.remove_bubble(&mut self.tree, Some(bubble)) == 0 {
            return None;
        }
        self.forget_orphaned_lookups();
        Some(self.rescan())
    }

    /// Close one ephemeral bubble, or all of them
    pub fn dismiss_bubble(&mut self, bubble: Option<BubbleId>) -> usize {
        let removed = self.engine.remove_bubble(&mut self.tree, bubble);
        self.forget_orphaned_lookups();
        removed
    }

    fn forget_orphaned_lookups(&mut self) {
        let engine = &self.engine;
        self.pending.retain(|p| engine.bubble(p.bubble).is_some());
    }
}

// =============================================================================
// BubbleContext
// =============================================================================

/// Outcome of a full activation through [`BubbleContext::activate`]
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    HighlightedExisting(BubbleId),
    Failed {
        bubble: Option<BubbleId>,
        error: BubbleError,
    },
    Resolved {
        bubble: BubbleId,
        entry: VocabularyEntry,
    },
    /// The answer failed or arrived after its bubble was closed
    Dropped(BubbleId),
}

/// An annotator wired to its collaborators
pub struct BubbleContext<T: DocumentTree, S, L, B> {
    annotator: Annotator<T>,
    store: VocabularyStore<S>,
    lookup: L,
    broadcaster: B,
    settings: Settings,
}

impl<T, S, L, B> BubbleContext<T, S, L, B>
where
    T: DocumentTree,
    S: KeyValueStore,
    L: LookupService,
    B: Broadcaster,
{
    pub fn new(annotator: Annotator<T>, store: S, lookup: L, broadcaster: B) -> Self {
        Self {
            annotator,
            store: VocabularyStore::new(store),
            lookup,
            broadcaster,
            settings: Settings::default(),
        }
    }

    pub fn annotator(&self) -> &Annotator<T> {
        &self.annotator
    }

    pub fn annotator_mut(&mut self) -> &mut Annotator<T> {
        &mut self.annotator
    }

    pub fn store(&self) -> &VocabularyStore<S> {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn reload_settings(&mut self) -> Result<(), BubbleError> {
        self.settings = self.store.load_settings().await?;
        Ok(())
    }

    /// Load settings and vocabulary, then rescan the document
    pub async fn refresh(&mut self) -> Result<ScanReport, BubbleError> {
        self.reload_settings().await?;
        let vocabulary = self.store.load_vocabulary().await?;
        Ok(self.annotator.apply_vocabulary(vocabulary))
    }

    /// Forward a click; runs the lookup when it confirms a gesture
    pub async fn handle_click(&mut self, point: Point) -> Option<Activation> {
        let snapshot = self
            .annotator
            .handle_click(point)
            .into_iter()
            .find_map(|effect| match effect {
                GestureEffect::Activate(snapshot) => Some(snapshot),
                _ => None,
            })?;
        Some(self.activate(&snapshot).await)
    }

    /// Look up `snapshot`, show the answer and save it to the vocabulary
    pub async fn activate(&mut self, snapshot: &SelectionSnapshot<T::Node>) -> Activation {
        let credential = self.settings.credential().map(str::to_string);
        let pending = match self.annotator.begin_lookup(snapshot, credential.as_deref()) {
            LookupStart::HighlightExisting(id) => return Activation::HighlightedExisting(id),
            LookupStart::Failed { bubble, error } => return Activation::Failed { bubble, error },
            LookupStart::Pending(pending) => pending,
        };

        let credential = credential.unwrap_or_default();
        let outcome = self.lookup.lookup(&pending.request, &credential).await;
        let Some(entry) = self.annotator.finish_lookup(pending.bubble, outcome) else {
            return Activation::Dropped(pending.bubble);
        };

        match self.store.save_translation(entry.clone()).await {
            Ok((vocabulary, _)) => {
                self.annotator.set_vocabulary(vocabulary);
                self.broadcaster.broadcast(ChangeNotice::VocabularyChanged);
            }
            Err(e) => console_error!("[BubbleContext] Could not save translation: {}", e),
        }
        Activation::Resolved {
            bubble: pending.bubble,
            entry,
        }
    }

    pub async fn save_settings(&mut self, settings: Settings) -> Result<(), BubbleError> {
        self.store.save_settings(&settings).await?;
        self.settings = settings;
        self.broadcaster.broadcast(ChangeNotice::SettingsChanged);
        Ok(())
    }

    pub async fn remove_word(&mut self, word: &str) -> Result<bool, BubbleError> {
        if !self.store.remove_word(word).await? {
            return Ok(false);
        }
        self.reload_vocabulary().await?;
        self.broadcaster.broadcast(ChangeNotice::VocabularyChanged);
        Ok(true)
    }

    pub async fn clear_vocabulary(&mut self) -> Result<ScanReport, BubbleError> {
        self.store.clear().await?;
        let report = self.annotator.apply_vocabulary(Vocabulary::new());
        self.broadcaster.broadcast(ChangeNotice::VocabularyChanged);
        Ok(report)
    }

    /// React to a notice sent by another view
    pub async fn handle_notice(&mut self, notice: ChangeNotice) -> Result<(), BubbleError> {
        match notice {
            ChangeNotice::SettingsChanged => self.reload_settings().await,
            ChangeNotice::VocabularyChanged => self.reload_vocabulary().await.map(|_| ()),
        }
    }

    async fn reload_vocabulary(&mut self) -> Result<ScanReport, BubbleError> {
        let vocabulary = self.store.load_vocabulary().await?;
        Ok(self.annotator.apply_vocabulary(vocabulary))
    }
}

// =============================================================================
// Tests
// =============================================================================
