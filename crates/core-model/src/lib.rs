//! Runtime data model for the playback engine: scenes, effects, segments,
//! dimmer envelopes, dissolve patterns, and the JSON documents they are
//! loaded from.
//!
//! The split mirrors the ingestion boundary: `doc` holds serde document
//! types that tolerate whatever a show editor wrote, conversion validates
//! once, and everything after that point works with runtime types whose
//! invariants hold. Render-time lookups that can still go out of range
//! (palette indices, effect indices) clamp to safe defaults instead of
//! failing, so a frame is always producible.

pub mod dimmer;
pub mod dissolve;
pub mod doc;
pub mod scene;
pub mod segment;

pub use dimmer::{DimmerEnvelope, DimmerStep};
pub use dissolve::{DissolvePattern, DissolveSet, DissolveWindow};
pub use doc::{DissolveDoc, ShowDoc, load_dissolve_file, load_show_file};
pub use scene::{Effect, Scene, SceneSet};
pub use segment::{MoveRange, Segment};

use std::path::PathBuf;
use thiserror::Error;

/// A `(scene, effect, palette)` index triple. The scene manager keeps one of
/// these as the visible selection and one as the cached/pending selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub scene: usize,
    pub effect: usize,
    pub palette: usize,
}

impl Selection {
    pub const fn new(scene: usize, effect: usize, palette: usize) -> Self {
        Self {
            scene,
            effect,
            palette,
        }
    }
}

/// Ingestion and loading failures. A document that fails validation is
/// rejected whole; a running show is never partially replaced.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("show document contains no scenes")]
    EmptyShow,
    #[error("scene {scene}: led_count {led_count} must be at least 1")]
    InvalidLedCount { scene: usize, led_count: i64 },
    #[error("scene {scene}: fps {fps} outside 1..=240")]
    InvalidFps { scene: usize, fps: i64 },
    #[error("scene {scene}: palette {palette} has {found} entries, expected 6")]
    PaletteSize {
        scene: usize,
        palette: usize,
        found: usize,
    },
    #[error("scene {scene}: current_effect_id {id} does not index {len} effects")]
    EffectIndex { scene: usize, id: i64, len: usize },
    #[error("scene {scene}: current_palette_id {id} does not index {len} palettes")]
    PaletteIndex { scene: usize, id: i64, len: usize },
    #[error(
        "scene {scene} effect {effect} segment {segment}: \
         {transparency} transparency values for {color} color points"
    )]
    TransparencyMismatch {
        scene: usize,
        effect: usize,
        segment: usize,
        transparency: usize,
        color: usize,
    },
    #[error(
        "scene {scene} effect {effect} segment {segment}: \
         {length} length entries exceed {color} color points"
    )]
    LengthOverColor {
        scene: usize,
        effect: usize,
        segment: usize,
        length: usize,
        color: usize,
    },
    #[error("scene {scene} effect {effect} segment {segment}: negative length entry {value}")]
    NegativeLength {
        scene: usize,
        effect: usize,
        segment: usize,
        value: i64,
    },
    #[error("scene {scene} effect {effect} segment {segment}: negative color index {value}")]
    NegativeColorIndex {
        scene: usize,
        effect: usize,
        segment: usize,
        value: i64,
    },
    #[error(
        "scene {scene} effect {effect} segment {segment}: \
         move_range [{lo}, {hi}] has lo > hi"
    )]
    InvalidMoveRange {
        scene: usize,
        effect: usize,
        segment: usize,
        lo: i64,
        hi: i64,
    },
}
