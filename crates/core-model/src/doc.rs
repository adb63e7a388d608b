//! Show and dissolve documents: the serde-facing JSON shapes and their
//! validated conversion into runtime types.
//!
//! Documents tolerate missing optional fields (`#[serde(default)]`) so show
//! editors can write sparse files, but conversion validates the structural
//! invariants once and rejects the whole document on the first violation.
//! Clampable values (transparency, dimmer brightness, negative durations)
//! are clamped here rather than rejected, matching the control channel's
//! misuse policy.

use crate::dimmer::{DimmerEnvelope, DimmerStep};
use crate::dissolve::{DissolvePattern, DissolveSet, DissolveWindow};
use crate::scene::{Effect, Scene, SceneSet};
use crate::segment::{MoveRange, Segment};
use crate::ModelError;
use core_color::{PALETTE_SIZE, Palette, Rgb};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct ShowDoc {
    pub scenes: Vec<SceneDoc>,
}

#[derive(Debug, Deserialize)]
pub struct SceneDoc {
    #[serde(default)]
    pub scene_id: u32,
    pub led_count: i64,
    pub fps: i64,
    #[serde(default)]
    pub current_effect_id: i64,
    #[serde(default)]
    pub current_palette_id: i64,
    pub palettes: Vec<Vec<[u8; 3]>>,
    pub effects: Vec<EffectDoc>,
}

#[derive(Debug, Deserialize)]
pub struct EffectDoc {
    #[serde(default)]
    pub effect_id: u32,
    #[serde(default)]
    pub segments: Vec<SegmentDoc>,
}

#[derive(Debug, Deserialize)]
pub struct SegmentDoc {
    #[serde(default)]
    pub segment_id: u32,
    pub color: Vec<i64>,
    pub transparency: Vec<f32>,
    #[serde(default)]
    pub length: Vec<i64>,
    #[serde(default)]
    pub move_speed: f64,
    pub move_range: [i64; 2],
    #[serde(default)]
    pub initial_position: i64,
    #[serde(default)]
    pub is_edge_reflect: bool,
    /// `[duration_ms, start_percent, end_percent]` triples.
    #[serde(default)]
    pub dimmer_time: Vec<[i64; 3]>,
}

#[derive(Debug, Deserialize)]
pub struct DissolveDoc {
    pub patterns: Vec<Vec<[i64; 4]>>,
}

impl ShowDoc {
    /// Validate and convert into runtime scenes. `now` becomes the birth
    /// instant of every segment in the show.
    pub fn into_scene_set(self, now: Instant) -> Result<SceneSet, ModelError> {
        if self.scenes.is_empty() {
            return Err(ModelError::EmptyShow);
        }
        let mut scenes = Vec::with_capacity(self.scenes.len());
        for (scene_idx, doc) in self.scenes.into_iter().enumerate() {
            scenes.push(convert_scene(scene_idx, doc, now)?);
        }
        Ok(SceneSet::new(scenes))
    }
}

impl DissolveDoc {
    /// Conversion is infallible: durations are clamped at zero, and an empty
    /// pattern list is a legal (if useless) dissolve set.
    pub fn into_dissolve_set(self) -> DissolveSet {
        let patterns = self
            .patterns
            .into_iter()
            .map(|windows| {
                DissolvePattern::new(
                    windows
                        .into_iter()
                        .map(|[start, fade_in, hold, fade_out]| {
                            DissolveWindow::new(
                                start.max(0) as u64,
                                fade_in.max(0) as u64,
                                hold.max(0) as u64,
                                fade_out.max(0) as u64,
                            )
                        })
                        .collect(),
                )
            })
            .collect();
        DissolveSet::new(patterns)
    }
}

fn convert_scene(scene_idx: usize, doc: SceneDoc, now: Instant) -> Result<Scene, ModelError> {
    if doc.led_count < 1 {
        return Err(ModelError::InvalidLedCount {
            scene: scene_idx,
            led_count: doc.led_count,
        });
    }
    if !(1..=240).contains(&doc.fps) {
        return Err(ModelError::InvalidFps {
            scene: scene_idx,
            fps: doc.fps,
        });
    }
    let mut palettes = Vec::with_capacity(doc.palettes.len());
    for (palette_idx, entries) in doc.palettes.into_iter().enumerate() {
        if entries.len() != PALETTE_SIZE {
            return Err(ModelError::PaletteSize {
                scene: scene_idx,
                palette: palette_idx,
                found: entries.len(),
            });
        }
        let mut fixed = [Rgb::BLACK; PALETTE_SIZE];
        for (slot, rgb) in fixed.iter_mut().zip(entries) {
            *slot = Rgb::from(rgb);
        }
        palettes.push(Palette::new(fixed));
    }
    let effect_count = doc.effects.len();
    let palette_count = palettes.len();
    let current_effect = index_in(doc.current_effect_id, effect_count).ok_or(
        ModelError::EffectIndex {
            scene: scene_idx,
            id: doc.current_effect_id,
            len: effect_count,
        },
    )?;
    let current_palette = index_in(doc.current_palette_id, palette_count).ok_or(
        ModelError::PaletteIndex {
            scene: scene_idx,
            id: doc.current_palette_id,
            len: palette_count,
        },
    )?;
    let mut effects = Vec::with_capacity(effect_count);
    for (effect_idx, effect_doc) in doc.effects.into_iter().enumerate() {
        let mut segments = Vec::with_capacity(effect_doc.segments.len());
        for (segment_idx, segment_doc) in effect_doc.segments.into_iter().enumerate() {
            segments.push(convert_segment(
                scene_idx,
                effect_idx,
                segment_idx,
                segment_doc,
                now,
            )?);
        }
        effects.push(Effect {
            effect_id: effect_doc.effect_id,
            segments,
        });
    }
    Ok(Scene {
        scene_id: doc.scene_id,
        led_count: doc.led_count as usize,
        fps: doc.fps as u32,
        current_effect_id: current_effect,
        current_palette_id: current_palette,
        palettes,
        effects,
    })
}

fn convert_segment(
    scene: usize,
    effect: usize,
    segment: usize,
    doc: SegmentDoc,
    now: Instant,
) -> Result<Segment, ModelError> {
    if doc.transparency.len() != doc.color.len() {
        return Err(ModelError::TransparencyMismatch {
            scene,
            effect,
            segment,
            transparency: doc.transparency.len(),
            color: doc.color.len(),
        });
    }
    if doc.length.len() > doc.color.len() {
        return Err(ModelError::LengthOverColor {
            scene,
            effect,
            segment,
            length: doc.length.len(),
            color: doc.color.len(),
        });
    }
    let [lo, hi] = doc.move_range;
    if lo > hi {
        return Err(ModelError::InvalidMoveRange {
            scene,
            effect,
            segment,
            lo,
            hi,
        });
    }
    let mut color = Vec::with_capacity(doc.color.len());
    for &index in &doc.color {
        if index < 0 {
            return Err(ModelError::NegativeColorIndex {
                scene,
                effect,
                segment,
                value: index,
            });
        }
        color.push(index as usize);
    }
    let mut length = Vec::with_capacity(doc.length.len());
    for &entry in &doc.length {
        if entry < 0 {
            return Err(ModelError::NegativeLength {
                scene,
                effect,
                segment,
                value: entry,
            });
        }
        length.push(entry as u32);
    }
    let transparency = doc
        .transparency
        .into_iter()
        .map(|t| t.clamp(0.0, 1.0))
        .collect();
    let dimmer = DimmerEnvelope::new(
        doc.dimmer_time
            .into_iter()
            .map(|[duration, start, end]| {
                DimmerStep::new(
                    duration.max(0) as u64,
                    start.clamp(0, 100) as u8,
                    end.clamp(0, 100) as u8,
                )
            })
            .collect(),
    );
    Ok(Segment {
        segment_id: doc.segment_id,
        color,
        transparency,
        length,
        move_speed: doc.move_speed,
        move_range: MoveRange::new(lo, hi),
        initial_position: doc.initial_position,
        current_position: doc.initial_position,
        is_edge_reflect: doc.is_edge_reflect,
        dimmer,
        born_at: now,
        fractional: 0.0,
    })
}

fn index_in(id: i64, len: usize) -> Option<usize> {
    if id >= 0 && (id as usize) < len {
        Some(id as usize)
    } else {
        None
    }
}

/// Append `.json` when the path carries no extension at all. The control
/// channel lets operators say `/load_json shows/demo`.
pub fn ensure_json_extension(path: &str) -> PathBuf {
    let p = PathBuf::from(path);
    if p.extension().is_none() {
        p.with_extension("json")
    } else {
        p
    }
}

/// Read, parse, and validate a show file.
pub fn load_show_file(path: &Path, now: Instant) -> Result<SceneSet, ModelError> {
    let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: ShowDoc = serde_json::from_str(&raw).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    doc.into_scene_set(now)
}

/// Read, parse, and validate a dissolve file.
pub fn load_dissolve_file(path: &Path) -> Result<DissolveSet, ModelError> {
    let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: DissolveDoc = serde_json::from_str(&raw).map_err(|source| ModelError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(doc.into_dissolve_set())
}
