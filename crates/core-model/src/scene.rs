//! Scene containers: effects composed of segments, scenes owning palettes
//! and effects, and the loaded show (`SceneSet`).
//!
//! Identifiers are compact zero-origin indices; `effect_id`/`scene_id`
//! labels carried from the document are informational only. Accessors return
//! `Option` so callers choose between rejecting a control message and
//! clamping at render time.

use crate::segment::Segment;
use core_color::Palette;

/// An ordered list of segments composited in list order (later segments
/// overwrite earlier ones where they overlap).
#[derive(Debug, Clone)]
pub struct Effect {
    pub effect_id: u32,
    pub segments: Vec<Segment>,
}

/// One strip configuration: physical properties plus its palette and effect
/// sets and the default selection a scene switch starts from.
#[derive(Debug, Clone)]
pub struct Scene {
    pub scene_id: u32,
    pub led_count: usize,
    pub fps: u32,
    pub current_effect_id: usize,
    pub current_palette_id: usize,
    pub palettes: Vec<Palette>,
    pub effects: Vec<Effect>,
}

impl Scene {
    pub fn effect(&self, index: usize) -> Option<&Effect> {
        self.effects.get(index)
    }

    pub fn effect_mut(&mut self, index: usize) -> Option<&mut Effect> {
        self.effects.get_mut(index)
    }

    pub fn palette(&self, index: usize) -> Option<&Palette> {
        self.palettes.get(index)
    }

    pub fn palette_mut(&mut self, index: usize) -> Option<&mut Palette> {
        self.palettes.get_mut(index)
    }
}

/// The loaded show. Owned exclusively by the scene manager; the renderer
/// borrows it read-only for the duration of one frame.
#[derive(Debug, Clone, Default)]
pub struct SceneSet {
    scenes: Vec<Scene>,
}

impl SceneSet {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn scene_mut(&mut self, index: usize) -> Option<&mut Scene> {
        self.scenes.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
