//! GlossCore: Inline Bubble Annotation Engine
//!
//! A Rust/WASM implementation of the KittClouds inline vocabulary bubbles.
//!
//! # Architecture
//!
//! ## Gesture Components
//! - `gesture/resolver.rs` - GestureResolver: double-click then click confirmation state machine
//!
//! ## Annotation Components
//! - `annotate/matcher.rs` - TermMatcher: whole-word, case-insensitive term matching
//! - `annotate/filter.rs` - NodeFilter: which text nodes are safe to rewrite
//! - `annotate/rewrite.rs` - Right-to-left rewrite planning for one text node
//! - `annotate/bubble.rs` - Bubble markers and the bubble registry
//! - `annotate/engine.rs` - AnnotationEngine: scan, ephemeral bubbles, dedup, removal
//!
//! ## Host Abstraction
//! - `dom/mod.rs` - DocumentTree capability trait
//! - `dom/memory.rs` - MemoryTree: in-memory tree for tests and native hosts
//! - `dom/web.rs` - WebTree: web-sys backed tree (wasm32 only)
//!
//! ## Collaborators
//! - `lookup/` - Lookup requests, payload parsing, context extraction
//! - `vocab/` - Vocabulary entries, key-value persistence, settings
//! - `notify.rs` - Cross-surface change notices
//! - `session.rs` - Annotator and BubbleContext orchestration
//!
//! ## Bindings
//! - `wasm.rs` - BubbleAnnotator: JS facade over the live document (wasm32 only)
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { BubbleAnnotator } from 'glosscore';
//!
//! await init();
//! const annotator = new BubbleAnnotator(null);
//!
//! document.addEventListener('dblclick', () => dispatch(annotator.onDoubleClick()));
//! document.addEventListener('selectionchange', () => dispatch(annotator.onSelectionChange()));
//! document.addEventListener('click', (e) => dispatch(annotator.onClick(e.clientX, e.clientY)));
//!
//! // Re-annotate the page with the stored vocabulary
//! annotator.scan(vocabulary);
//! ```

#[macro_use]
mod log;

pub mod annotate;
pub mod config;
pub mod dom;
pub mod error;
pub mod gesture;
pub mod lookup;
pub mod notify;
pub mod session;
pub mod vocab;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use annotate::*;
pub use config::*;
pub use dom::*;
pub use error::*;
pub use gesture::*;
pub use lookup::*;
pub use notify::*;
pub use session::*;
pub use vocab::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("glosscore v{}", env!("CARGO_PKG_VERSION"))
}
