//! GestureResolver: double-click, wait, click-to-confirm
//!
//! # States
//! `Idle → Listening → Ready → (Activated | Idle)`
//!
//! A double-click with a short selection captures a snapshot and arms one
//! timer. When it fires and the live selection still reads the same, the
//! next click confirms the lookup if it lands inside the selection's anchor
//! element. `Activated` emits once and falls straight back to `Idle`.
//!
//! The resolver never owns a real timer. It hands out [`TimerToken`]s through
//! [`GestureEffect::ArmTimer`] and the host calls [`GestureResolver::on_timer`]
//! when the delay elapses. Only the most recently armed token is honoured.

use serde::{Deserialize, Serialize};

use crate::config::AnnotatorConfig;
use crate::dom::{DocumentTree, LiveSelection, Point, Rect, TextRange};

/// Extra margin around the selection box used when no element can be hit-tested
const CLICK_FALLBACK_MARGIN: f64 = 4.0;

// =============================================================================
// Types
// =============================================================================

/// Handle for one armed activation timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerToken(pub u64);

/// Gesture state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureState {
    /// No snapshot; waiting for a double-click
    Idle,
    /// Snapshot captured, activation timer armed
    Listening,
    /// Timer elapsed with an unchanged selection; waiting for a click
    Ready,
    /// Lookup emitted; only observable between emission and reset
    Activated,
}

impl GestureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureState::Idle => "idle",
            GestureState::Listening => "listening",
            GestureState::Ready => "ready",
            GestureState::Activated => "activated",
        }
    }
}

/// Immutable capture of the selection at double-click time
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot<N> {
    pub text: String,
    pub range: TextRange<N>,
    pub rect: Rect,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEffect<N> {
    /// Schedule `on_timer(token)` after `delay_ms`
    ArmTimer { token: TimerToken, delay_ms: u32 },
    /// A previously armed token is dead; the host may clear it
    CancelTimer { token: TimerToken },
    /// The machine reached `Ready` for the current snapshot
    Ready,
    /// Lookup confirmed for this snapshot
    Activate(SelectionSnapshot<N>),
    /// Remove any pronunciation hint tied to the previous snapshot
    ClearPronunciation,
}

// =============================================================================
// GestureResolver
// =============================================================================

/// Converts a double-click + click sequence into one lookup activation
#[derive(Debug)]
pub struct GestureResolver<N> {
    state: GestureState,
    snapshot: Option<SelectionSnapshot<N>>,
    timer: Option<TimerToken>,
    next_token: u64,
    config: AnnotatorConfig,
}

impl<N: Clone + PartialEq> Default for GestureResolver<N> {
    fn default() -> Self {
        Self::new(&AnnotatorConfig::default())
    }
}

impl<N: Clone + PartialEq> GestureResolver<N> {
    pub fn new(config: &AnnotatorConfig) -> Self {
        Self {
            state: GestureState::Idle,
            snapshot: None,
            timer: None,
            next_token: 0,
            config: config.clone(),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn snapshot(&self) -> Option<&SelectionSnapshot<N>> {
        self.snapshot.as_ref()
    }

    /// The timer currently honoured by `on_timer`
    pub fn pending_timer(&self) -> Option<TimerToken> {
        self.timer
    }

    /// A double-click finished with `selection` as the live selection
    pub fn on_double_click(&mut self, selection: Option<LiveSelection<N>>) -> Vec<GestureEffect<N>> {
        let mut effects = Vec::new();
        self.cancel_timer(&mut effects);

        let accepted = selection.and_then(|sel| {
            let text = sel.text.trim().to_string();
            self.config
                .accepts_selection(text.chars().count())
                .then(|| SelectionSnapshot { text, range: sel.range, rect: sel.rect })
        });

        match accepted {
            Some(snapshot) => {
                if self.state == GestureState::Ready {
                    effects.push(GestureEffect::ClearPronunciation);
                }
                self.snapshot = Some(snapshot);
                self.state = GestureState::Listening;
                let token = self.arm_timer();
                effects.push(GestureEffect::ArmTimer { token, delay_ms: self.config.activation_delay_ms });
            }
            None => self.enter_idle(&mut effects),
        }
        effects
    }

    /// The live selection changed; only matters while listening
    pub fn on_selection_change(&mut self, live_text: Option<&str>) -> Vec<GestureEffect<N>> {
        let mut effects = Vec::new();
        if self.state == GestureState::Listening && !self.matches_snapshot(live_text) {
            self.cancel_timer(&mut effects);
            self.enter_idle(&mut effects);
        }
        effects
    }

    /// The activation delay for `token` elapsed
    pub fn on_timer(&mut self, token: TimerToken, live_text: Option<&str>) -> Vec<GestureEffect<N>> {
        let mut effects = Vec::new();
        if self.timer != Some(token) || self.state != GestureState::Listening {
            return effects;
        }
        self.timer = None;

        if self.matches_snapshot(live_text) {
            self.state = GestureState::Ready;
            effects.push(GestureEffect::Ready);
        } else {
            self.enter_idle(&mut effects);
        }
        effects
    }

    /// A single click landed at `point`
    pub fn on_click<T>(&mut self, tree: &T, point: Point) -> Vec<GestureEffect<N>>
    where
        T: DocumentTree<Node = N>,
    {
        let mut effects = Vec::new();
        if self.state != GestureState::Ready {
            return effects;
        }

        let confirmed = match &self.snapshot {
            Some(snapshot) => click_confirms(tree, snapshot, point),
            None => false,
        };

        if confirmed {
            self.state = GestureState::Activated;
            if let Some(snapshot) = self.snapshot.clone() {
                effects.push(GestureEffect::Activate(snapshot));
            }
        }
        self.enter_idle(&mut effects);
        effects
    }

    /// Drop back to `Idle` from anywhere
    pub fn reset(&mut self) -> Vec<GestureEffect<N>> {
        let mut effects = Vec::new();
        self.cancel_timer(&mut effects);
        self.enter_idle(&mut effects);
        effects
    }

    fn matches_snapshot(&self, live_text: Option<&str>) -> bool {
        match (&self.snapshot, live_text) {
            (Some(snapshot), Some(live)) => live.trim() == snapshot.text,
            _ => false,
        }
    }

    fn arm_timer(&mut self) -> TimerToken {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.timer = Some(token);
        token
    }

    fn cancel_timer(&mut self, effects: &mut Vec<GestureEffect<N>>) {
        if let Some(token) = self.timer.take() {
            effects.push(GestureEffect::CancelTimer { token });
        }
    }

    fn enter_idle(&mut self, effects: &mut Vec<GestureEffect<N>>) {
        if self.state != GestureState::Idle {
            effects.push(GestureEffect::ClearPronunciation);
        }
        self.state = GestureState::Idle;
        self.snapshot = None;
    }
}

/// The click confirms when its target sits inside the selection's anchor element
fn click_confirms<T: DocumentTree>(tree: &T, snapshot: &SelectionSnapshot<T::Node>, point: Point) -> bool {
    let anchor = snapshot.range.anchor();
    let anchor_element = if tree.is_text(anchor) {
        tree.parent(anchor)
    } else {
        Some(anchor.clone())
    };

    match (tree.element_at_point(point), anchor_element) {
        (Some(hit), Some(anchor_element)) => tree.contains(&anchor_element, &hit),
        (None, _) => !snapshot.rect.is_empty() && snapshot.rect.inflate(CLICK_FALLBACK_MARGIN).contains(point),
        (Some(_), None) => false,
    }
}

// =============================================================================
// Tests
// =============================================================================
