//! WASM bindings for the bubble annotator
//!
//! JS owns timers, storage and the HTTP call. Every gesture method returns
//! an array of effects; the host arms or cancels `setTimeout` for
//! `armTimer` / `cancelTimer` and calls `beginLookup` after `activate`.

use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::Node;

use crate::annotate::BubbleId;
use crate::config::AnnotatorConfig;
use crate::dom::{Point, WebTree};
use crate::error::BubbleError;
use crate::gesture::{GestureEffect, SelectionSnapshot, TimerToken};
use crate::session::{Annotator, LookupStart};
use crate::vocab::{Vocabulary, VocabularyEntry};

/// JS view of one gesture effect
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EffectView {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl EffectView {
    fn from_effect(effect: &GestureEffect<Node>) -> Self {
        let (kind, token, delay_ms, text) = match effect {
            GestureEffect::ArmTimer { token, delay_ms } => ("armTimer", Some(token.0 as u32), Some(*delay_ms), None),
            GestureEffect::CancelTimer { token } => ("cancelTimer", Some(token.0 as u32), None, None),
            GestureEffect::Ready => ("ready", None, None, None),
            GestureEffect::Activate(snapshot) => ("activate", None, None, Some(snapshot.text.clone())),
            GestureEffect::ClearPronunciation => ("clearPronunciation", None, None, None),
        };
        Self { kind, token, delay_ms, text }
    }
}

/// JS view of a lookup start
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupStartView {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bubble_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn parse_bubble_id(id: &str) -> Result<BubbleId, JsValue> {
    BubbleId::parse(id).ok_or_else(|| JsValue::from_str(&format!("Invalid bubble id: {}", id)))
}

/// Browser-side annotator bound to `window.document`
#[wasm_bindgen]
pub struct BubbleAnnotator {
    inner: Annotator<WebTree>,
    activated: Option<SelectionSnapshot<Node>>,
}

impl BubbleAnnotator {
    /// Remember the activated snapshot and convert effects for JS
    fn effects(&mut self, effects: Vec<GestureEffect<Node>>) -> JsValue {
        if let Some(snapshot) = effects.iter().find_map(|e| match e {
            GestureEffect::Activate(snapshot) => Some(snapshot.clone()),
            _ => None,
        }) {
            self.activated = Some(snapshot);
        }
        let views: Vec<EffectView> = effects.iter().map(EffectView::from_effect).collect();
        serde_wasm_bindgen::to_value(&views).unwrap_or(JsValue::NULL)
    }
}

#[wasm_bindgen]
impl BubbleAnnotator {
    /// Create an annotator; `config` may be null for defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<BubbleAnnotator, JsValue> {
        let config: AnnotatorConfig = if config.is_null() || config.is_undefined() {
            AnnotatorConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };
        let tree = WebTree::new().ok_or_else(|| JsValue::from_str("No document available"))?;
        Ok(Self {
            inner: Annotator::new(tree, config),
            activated: None,
        })
    }

    #[wasm_bindgen(js_name = "onDoubleClick")]
    pub fn on_double_click(&mut self) -> JsValue {
        let effects = self.inner.handle_double_click();
        self.effects(effects)
    }

    #[wasm_bindgen(js_name = "onSelectionChange")]
    pub fn on_selection_change(&mut self) -> JsValue {
        let effects = self.inner.handle_selection_change();
        self.effects(effects)
    }

    #[wasm_bindgen(js_name = "onTimer")]
    pub fn on_timer(&mut self, token: u32) -> JsValue {
        let effects = self.inner.handle_timer(TimerToken(token as u64));
        self.effects(effects)
    }

    #[wasm_bindgen(js_name = "onClick")]
    pub fn on_click(&mut self, x: f64, y: f64) -> JsValue {
        let effects = self.inner.handle_click(Point::new(x, y));
        self.effects(effects)
    }

    /// Start the lookup for the last activated selection
    #[wasm_bindgen(js_name = "beginLookup")]
    pub fn begin_lookup(&mut self, api_key: Option<String>) -> Result<JsValue, JsValue> {
        let snapshot = self
            .activated
            .take()
            .ok_or_else(|| JsValue::from_str("No activated selection"))?;

        let view = match self.inner.begin_lookup(&snapshot, api_key.as_deref()) {
            LookupStart::HighlightExisting(id) => LookupStartView {
                status: "highlightExisting",
                bubble_id: Some(id.to_string()),
                text: Some(snapshot.text.clone()),
                context: None,
                message: None,
            },
            LookupStart::Failed { bubble, error } => LookupStartView {
                status: "failed",
                bubble_id: bubble.map(|b| b.to_string()),
                text: Some(snapshot.text.clone()),
                context: None,
                message: Some(error.user_message()),
            },
            LookupStart::Pending(pending) => LookupStartView {
                status: "pending",
                bubble_id: Some(pending.bubble.to_string()),
                text: Some(pending.request.text),
                context: Some(pending.request.context),
                message: None,
            },
        };
        serde_wasm_bindgen::to_value(&view).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Deliver the raw lookup response; returns the entry to persist or null
    #[wasm_bindgen(js_name = "finishLookup")]
    pub fn finish_lookup(&mut self, bubble_id: &str, payload: String) -> Result<JsValue, JsValue> {
        let id = parse_bubble_id(bubble_id)?;
        match self.inner.finish_lookup(id, Ok(payload)) {
            Some(entry) => serde_wasm_bindgen::to_value(&entry).map_err(|e| JsValue::from_str(&e.to_string())),
            None => Ok(JsValue::NULL),
        }
    }

    /// Report a failed lookup; the bubble shows a generic message
    #[wasm_bindgen(js_name = "failLookup")]
    pub fn fail_lookup(&mut self, bubble_id: &str, message: String) -> Result<(), JsValue> {
        let id = parse_bubble_id(bubble_id)?;
        self.inner.finish_lookup(id, Err(BubbleError::TransportFailure(message)));
        Ok(())
    }

    /// Rescan the document with a stored vocabulary array
    #[wasm_bindgen(js_name = "scan")]
    pub fn scan(&mut self, vocabulary: JsValue) -> Result<JsValue, JsValue> {
        let entries: Vec<VocabularyEntry> = if vocabulary.is_null() || vocabulary.is_undefined() {
            Vec::new()
        } else {
            serde_wasm_bindgen::from_value(vocabulary)
                .map_err(|e| JsValue::from_str(&format!("Failed to parse vocabulary: {}", e)))?
        };
        let report = self.inner.apply_vocabulary(Vocabulary::from_entries(entries));
        serde_wasm_bindgen::to_value(&report).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Close one ephemeral bubble, or all of them when `id` is omitted
    #[wasm_bindgen(js_name = "dismissBubble")]
    pub fn dismiss_bubble(&mut self, id: Option<String>) -> Result<usize, JsValue> {
        let id = id.as_deref().map(parse_bubble_id).transpose()?;
        Ok(self.inner.dismiss_bubble(id))
    }

    /// Remove a resolved bubble and rescan; null when it was already gone
    #[wasm_bindgen(js_name = "consumeBubble")]
    pub fn consume_bubble(&mut self, id: &str) -> Result<JsValue, JsValue> {
        let id = parse_bubble_id(id)?;
        match self.inner.consume_bubble(id) {
            Some(report) => serde_wasm_bindgen::to_value(&report).map_err(|e| JsValue::from_str(&e.to_string())),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = "bubbleCount")]
    pub fn bubble_count(&self) -> usize {
        self.inner.bubble_count()
    }

    /// Ids of the open ephemeral bubbles
    #[wasm_bindgen(js_name = "ephemeralIds")]
    pub fn ephemeral_ids(&self) -> js_sys::Array {
        self.inner
            .engine()
            .ephemeral_ids()
            .into_iter()
            .map(|id| JsValue::from_str(&id.to_string()))
            .collect()
    }

    #[wasm_bindgen(js_name = "gestureState")]
    pub fn gesture_state(&self) -> String {
        self.inner.gesture_state().as_str().to_string()
    }
}
