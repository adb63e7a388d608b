//! The scene manager: single owner of the loaded show and dissolve set,
//! mutated only by control commands applied at frame boundaries, read by
//! the frame pipeline.
//!
//! Selections come in pairs. `active` is what the strip shows; `pending`
//! accumulates `cache_*` requests invisibly until `trigger_pattern`
//! dissolves over to it. Every control operation validates first and leaves
//! state untouched on rejection, so a bad message can never half-apply.

use crate::dissolve::{DissolveSource, DissolveState, RunningDissolve, merge_frames};
use core_color::{PALETTE_SIZE, Rgb, apply_master};
use core_model::{DissolvePattern, DissolveSet, SceneSet, Selection};
use core_render::{advance_segment, compose_effect};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Rejections for control operations that reference missing entities. The
/// command dispatcher logs these; they never reach the frame pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("scene index {index} out of range ({len} scenes loaded)")]
    UnknownScene { index: usize, len: usize },
    #[error("effect index {index} out of range for scene {scene} ({len} effects)")]
    UnknownEffect {
        scene: usize,
        index: usize,
        len: usize,
    },
    #[error("palette index {index} out of range for scene {scene} ({len} palettes)")]
    UnknownPalette {
        scene: usize,
        index: usize,
        len: usize,
    },
    #[error("dissolve pattern index {index} out of range ({len} patterns loaded)")]
    UnknownPattern { index: usize, len: usize },
    #[error("palette entry index {entry} out of range (palettes hold {PALETTE_SIZE} entries)")]
    UnknownPaletteEntry { entry: usize },
}

pub struct SceneManager {
    show: SceneSet,
    dissolves: DissolveSet,
    active: Selection,
    pending: Selection,
    dissolve: DissolveState,
    paused: bool,
    master_brightness: u8,
    speed_percent: u16,
    dissolve_pattern_index: usize,
    default_led_count: usize,
    default_fps: u32,
    /// Previous frame's merged output before master brightness; becomes the
    /// frozen source when a dissolve is replaced mid-flight.
    last_merged: Vec<Rgb>,
}

impl SceneManager {
    pub fn new(default_led_count: usize, default_fps: u32, master_brightness: u8) -> Self {
        Self {
            show: SceneSet::default(),
            dissolves: DissolveSet::default(),
            active: Selection::new(0, 0, 0),
            pending: Selection::new(0, 0, 0),
            dissolve: DissolveState::Idle,
            paused: false,
            master_brightness,
            speed_percent: 100,
            dissolve_pattern_index: 0,
            default_led_count: default_led_count.max(1),
            default_fps: default_fps.clamp(1, 240),
            last_merged: Vec::new(),
        }
    }

    // ---- show + dissolve set replacement -------------------------------

    /// Replace the loaded show. The first scene's default effect/palette
    /// become both the active and the pending selection; playback of the new
    /// show begins on the next frame.
    pub fn load_show(&mut self, show: SceneSet) {
        let selection = show
            .scene(0)
            .map(|scene| Selection::new(0, scene.current_effect_id, scene.current_palette_id))
            .unwrap_or(Selection::new(0, 0, 0));
        info!(
            target: "scene.manager",
            scenes = show.len(),
            scene = selection.scene,
            effect = selection.effect,
            palette = selection.palette,
            "show loaded"
        );
        self.show = show;
        self.active = selection;
        self.pending = selection;
        self.dissolve = DissolveState::Idle;
        self.last_merged.clear();
    }

    pub fn load_dissolves(&mut self, dissolves: DissolveSet) {
        info!(target: "scene.manager", patterns = dissolves.len(), "dissolve set loaded");
        if self.dissolve_pattern_index >= dissolves.len() {
            self.dissolve_pattern_index = 0;
        }
        self.dissolves = dissolves;
    }

    // ---- cached/pending selection --------------------------------------

    pub fn cache_scene(&mut self, index: usize) -> Result<(), SceneError> {
        let scene = self.show.scene(index).ok_or(SceneError::UnknownScene {
            index,
            len: self.show.len(),
        })?;
        self.pending = Selection::new(index, scene.current_effect_id, scene.current_palette_id);
        debug!(target: "scene.manager", scene = index, "scene cached");
        Ok(())
    }

    pub fn cache_effect(&mut self, index: usize) -> Result<(), SceneError> {
        let scene = self
            .show
            .scene(self.pending.scene)
            .ok_or(SceneError::UnknownScene {
                index: self.pending.scene,
                len: self.show.len(),
            })?;
        if index >= scene.effects.len() {
            return Err(SceneError::UnknownEffect {
                scene: self.pending.scene,
                index,
                len: scene.effects.len(),
            });
        }
        self.pending.effect = index;
        debug!(target: "scene.manager", effect = index, "effect cached");
        Ok(())
    }

    pub fn cache_palette(&mut self, index: usize) -> Result<(), SceneError> {
        let scene = self
            .show
            .scene(self.pending.scene)
            .ok_or(SceneError::UnknownScene {
                index: self.pending.scene,
                len: self.show.len(),
            })?;
        if index >= scene.palettes.len() {
            return Err(SceneError::UnknownPalette {
                scene: self.pending.scene,
                index,
                len: scene.palettes.len(),
            });
        }
        self.pending.palette = index;
        debug!(target: "scene.manager", palette = index, "palette cached");
        Ok(())
    }

    pub fn select_dissolve_pattern(&mut self, index: usize) -> Result<(), SceneError> {
        if index >= self.dissolves.len() {
            return Err(SceneError::UnknownPattern {
                index,
                len: self.dissolves.len(),
            });
        }
        self.dissolve_pattern_index = index;
        Ok(())
    }

    /// Start (or replace) the dissolve toward the pending selection.
    /// Returns `false` for the documented no-op when nothing is pending.
    ///
    /// The no-op guard only applies at rest: while a dissolve is running the
    /// strip no longer shows `active`, so a retrigger always replaces the
    /// transition, even one aimed back at the selection it departed from.
    pub fn trigger_pattern(&mut self, now: Instant) -> bool {
        if !self.dissolve.is_running() && self.pending == self.active {
            debug!(target: "scene.dissolve", "trigger ignored, nothing pending");
            return false;
        }
        let pattern = self
            .dissolves
            .pattern(self.dissolve_pattern_index)
            .cloned()
            .unwrap_or_else(DissolvePattern::default);
        let source = if self.dissolve.is_running() {
            // Replacing an in-flight dissolve departs from what the strip
            // is actually showing right now.
            DissolveSource::Snapshot(self.last_merged.clone())
        } else {
            DissolveSource::Selection(self.active)
        };
        info!(
            target: "scene.dissolve",
            pattern = self.dissolve_pattern_index,
            replaced = self.dissolve.is_running(),
            scene = self.pending.scene,
            effect = self.pending.effect,
            palette = self.pending.palette,
            "dissolve started"
        );
        self.dissolve = DissolveState::Running(RunningDissolve {
            started: now,
            pattern,
            source,
            target: self.pending,
        });
        true
    }

    // ---- global knobs --------------------------------------------------

    pub fn pause(&mut self) {
        self.paused = true;
        info!(target: "scene.manager", "paused");
    }

    pub fn resume(&mut self) {
        self.paused = false;
        info!(target: "scene.manager", "resumed");
    }

    pub fn set_master_brightness(&mut self, value: i32) {
        self.master_brightness = value.clamp(0, 255) as u8;
    }

    pub fn set_speed_percent(&mut self, value: i32) {
        self.speed_percent = value.clamp(0, 1023) as u16;
    }

    /// Mutate one palette entry of the active scene in place; visible on the
    /// next rendered frame.
    pub fn update_palette_entry(
        &mut self,
        palette: usize,
        entry: usize,
        rgb: Rgb,
    ) -> Result<(), SceneError> {
        if entry >= PALETTE_SIZE {
            return Err(SceneError::UnknownPaletteEntry { entry });
        }
        let scene_index = self.active.scene;
        let show_len = self.show.len();
        let scene = self
            .show
            .scene_mut(scene_index)
            .ok_or(SceneError::UnknownScene {
                index: scene_index,
                len: show_len,
            })?;
        let len = scene.palettes.len();
        let slot = scene
            .palette_mut(palette)
            .ok_or(SceneError::UnknownPalette {
                scene: scene_index,
                index: palette,
                len,
            })?;
        slot.set_color(entry, rgb);
        Ok(())
    }

    // ---- per-frame pipeline --------------------------------------------

    /// Produce the next output frame, or `None` while paused.
    ///
    /// Runs the whole frame pipeline except fan-out: movement integration,
    /// composition of the active selection (and the dissolve target when one
    /// is running), the per-LED dissolve merge, and master brightness.
    pub fn render_frame(&mut self, now: Instant) -> Option<Vec<Rgb>> {
        if self.paused {
            return None;
        }
        let fps = self.fps();
        let speed_factor = f64::from(self.speed_percent) / 100.0;
        self.integrate(self.active, fps, speed_factor);
        let dissolve_target = match &self.dissolve {
            DissolveState::Running(run) => Some(run.target),
            DissolveState::Idle => None,
        };
        if let Some(target) = dissolve_target {
            // A dissolve whose target shares the active effect must not
            // integrate those segments a second time.
            if (target.scene, target.effect) != (self.active.scene, self.active.effect) {
                self.integrate(target, fps, speed_factor);
            }
        }

        let mut frame = match self.show.scene(self.active.scene) {
            Some(scene) => compose_effect(scene, self.active.effect, self.active.palette, now),
            None => vec![Rgb::BLACK; self.default_led_count],
        };

        let mut completed = false;
        if let DissolveState::Running(run) = &self.dissolve {
            let elapsed = now.saturating_duration_since(run.started).as_millis() as u64;
            let mut target_frame = match self.show.scene(run.target.scene) {
                Some(scene) => compose_effect(scene, run.target.effect, run.target.palette, now),
                None => vec![Rgb::BLACK; frame.len()],
            };
            // The strip keeps the departing scene's size until the switch
            // completes.
            target_frame.resize(frame.len(), Rgb::BLACK);
            let source_frame: &[Rgb] = match &run.source {
                DissolveSource::Selection(_) => &frame,
                DissolveSource::Snapshot(snapshot) => snapshot,
            };
            let mut merged = Vec::new();
            completed = merge_frames(&run.pattern, elapsed, source_frame, &target_frame, &mut merged);
            frame = merged;
        }
        if completed {
            if let DissolveState::Running(run) = std::mem::take(&mut self.dissolve) {
                info!(
                    target: "scene.dissolve",
                    scene = run.target.scene,
                    effect = run.target.effect,
                    palette = run.target.palette,
                    "dissolve complete"
                );
                self.active = run.target;
                self.pending = run.target;
            }
        }

        self.last_merged.clone_from(&frame);
        let master = self.master_brightness;
        Some(frame.into_iter().map(|c| apply_master(c, master)).collect())
    }

    fn integrate(&mut self, selection: Selection, fps: u32, speed_factor: f64) {
        if let Some(scene) = self.show.scene_mut(selection.scene) {
            if let Some(effect) = scene.effect_mut(selection.effect) {
                for segment in &mut effect.segments {
                    advance_segment(segment, fps, speed_factor);
                }
            }
        }
    }

    // ---- observers -----------------------------------------------------

    pub fn fps(&self) -> u32 {
        self.show
            .scene(self.active.scene)
            .map(|scene| scene.fps)
            .unwrap_or(self.default_fps)
    }

    pub fn led_count(&self) -> usize {
        self.show
            .scene(self.active.scene)
            .map(|scene| scene.led_count)
            .unwrap_or(self.default_led_count)
    }

    pub fn active(&self) -> Selection {
        self.active
    }

    pub fn pending(&self) -> Selection {
        self.pending
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_dissolving(&self) -> bool {
        self.dissolve.is_running()
    }

    pub fn master_brightness(&self) -> u8 {
        self.master_brightness
    }

    pub fn speed_percent(&self) -> u16 {
        self.speed_percent
    }

    pub fn show(&self) -> &SceneSet {
        &self.show
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{
        DimmerEnvelope, DissolvePattern, DissolveWindow, Effect, MoveRange, Scene, Segment,
    };
    use core_color::Palette;

    fn solid_scene(scene_id: u32, color: Rgb, led_count: usize) -> Scene {
        let mut entries = [Rgb::BLACK; PALETTE_SIZE];
        entries[0] = color;
        Scene {
            scene_id,
            led_count,
            fps: 50,
            current_effect_id: 0,
            current_palette_id: 0,
            palettes: vec![Palette::new(entries)],
            effects: vec![Effect {
                effect_id: 0,
                segments: vec![Segment {
                    segment_id: 0,
                    color: vec![0],
                    transparency: vec![0.0],
                    length: vec![led_count as u32],
                    move_speed: 0.0,
                    move_range: MoveRange::new(0, led_count as i64 - 1),
                    initial_position: 0,
                    current_position: 0,
                    is_edge_reflect: false,
                    dimmer: DimmerEnvelope::constant(),
                    born_at: Instant::now(),
                    fractional: 0.0,
                }],
            }],
        }
    }

    fn manager_with_two_scenes() -> SceneManager {
        let mut m = SceneManager::new(8, 40, 255);
        m.load_show(SceneSet::new(vec![
            solid_scene(0, Rgb::new(255, 255, 255), 8),
            solid_scene(1, Rgb::new(0, 0, 255), 8),
        ]));
        m
    }

    #[test]
    fn load_show_resets_selections() {
        let m = manager_with_two_scenes();
        assert_eq!(m.active(), Selection::new(0, 0, 0));
        assert_eq!(m.pending(), m.active());
        assert!(!m.is_dissolving());
        assert_eq!(m.fps(), 50);
        assert_eq!(m.led_count(), 8);
    }

    #[test]
    fn empty_manager_renders_default_black_strip() {
        let mut m = SceneManager::new(16, 40, 255);
        let frame = m.render_frame(Instant::now()).unwrap();
        assert_eq!(frame, vec![Rgb::BLACK; 16]);
        assert_eq!(m.fps(), 40);
    }

    #[test]
    fn cache_does_not_change_output() {
        let mut m = manager_with_two_scenes();
        let now = Instant::now();
        let before = m.render_frame(now).unwrap();
        m.cache_scene(1).unwrap();
        let after = m.render_frame(now).unwrap();
        assert_eq!(before, after, "caching must stay invisible until triggered");
        assert_eq!(m.pending().scene, 1);
        assert_eq!(m.active().scene, 0);
    }

    #[test]
    fn invalid_cache_leaves_pending_unchanged() {
        let mut m = manager_with_two_scenes();
        assert_eq!(
            m.cache_scene(5),
            Err(SceneError::UnknownScene { index: 5, len: 2 })
        );
        assert_eq!(m.pending(), m.active());
        assert!(matches!(
            m.cache_effect(3),
            Err(SceneError::UnknownEffect { index: 3, .. })
        ));
        assert!(matches!(
            m.cache_palette(9),
            Err(SceneError::UnknownPalette { index: 9, .. })
        ));
    }

    #[test]
    fn trigger_without_pending_is_noop() {
        let mut m = manager_with_two_scenes();
        assert!(!m.trigger_pattern(Instant::now()));
        assert!(!m.is_dissolving());
    }

    #[test]
    fn trigger_without_pattern_hard_switches() {
        let mut m = manager_with_two_scenes();
        let now = Instant::now();
        m.cache_scene(1).unwrap();
        assert!(m.trigger_pattern(now));
        // Empty pattern: every LED hard-switches, so the very next frame is
        // the target and the dissolve completes.
        let frame = m.render_frame(now).unwrap();
        assert_eq!(frame, vec![Rgb::new(0, 0, 255); 8]);
        assert!(!m.is_dissolving());
        assert_eq!(m.active().scene, 1);
    }

    #[test]
    fn dissolve_promotes_active_after_completion() {
        let mut m = manager_with_two_scenes();
        m.load_dissolves(DissolveSet::new(vec![DissolvePattern::new(vec![
            DissolveWindow::new(0, 1000, 0, 0);
            8
        ])]));
        let t0 = Instant::now();
        m.cache_scene(1).unwrap();
        assert!(m.trigger_pattern(t0));
        assert!(m.is_dissolving());

        let start = m.render_frame(t0).unwrap();
        assert_eq!(start, vec![Rgb::new(255, 255, 255); 8]);

        let mid = m
            .render_frame(t0 + std::time::Duration::from_millis(500))
            .unwrap();
        // White toward blue: red/green fall to 127, blue stays saturated.
        assert_eq!(mid, vec![Rgb::new(127, 127, 255); 8]);
        assert!(m.is_dissolving());

        let done = m
            .render_frame(t0 + std::time::Duration::from_millis(1000))
            .unwrap();
        assert_eq!(done, vec![Rgb::new(0, 0, 255); 8]);
        assert!(!m.is_dissolving());
        assert_eq!(m.active(), Selection::new(1, 0, 0));
        assert_eq!(m.pending(), m.active());
    }

    #[test]
    fn retrigger_freezes_current_frame_as_source() {
        let mut m = manager_with_two_scenes();
        m.load_dissolves(DissolveSet::new(vec![DissolvePattern::new(vec![
            DissolveWindow::new(0, 1000, 0, 0);
            8
        ])]));
        let t0 = Instant::now();
        m.cache_scene(1).unwrap();
        m.trigger_pattern(t0);
        let _ = m.render_frame(t0 + std::time::Duration::from_millis(500));

        // Replace mid-flight; the new dissolve departs from the half-blended
        // gray, not from scene 0's white.
        let t1 = t0 + std::time::Duration::from_millis(500);
        m.cache_scene(0).unwrap();
        assert!(m.trigger_pattern(t1));
        let frame = m.render_frame(t1).unwrap();
        assert_eq!(frame, vec![Rgb::new(127, 127, 255); 8]);
    }

    #[test]
    fn pause_skips_rendering_resume_restores() {
        let mut m = manager_with_two_scenes();
        m.pause();
        assert!(m.is_paused());
        assert!(m.render_frame(Instant::now()).is_none());
        m.resume();
        assert!(m.render_frame(Instant::now()).is_some());
    }

    #[test]
    fn master_brightness_scales_output() {
        let mut m = manager_with_two_scenes();
        m.set_master_brightness(128);
        let frame = m.render_frame(Instant::now()).unwrap();
        assert_eq!(frame, vec![Rgb::new(128, 128, 128); 8]);
        m.set_master_brightness(5000);
        assert_eq!(m.master_brightness(), 255);
        m.set_master_brightness(-4);
        assert_eq!(m.master_brightness(), 0);
    }

    #[test]
    fn speed_percent_clamps() {
        let mut m = manager_with_two_scenes();
        m.set_speed_percent(2000);
        assert_eq!(m.speed_percent(), 1023);
        m.set_speed_percent(-5);
        assert_eq!(m.speed_percent(), 0);
    }

    #[test]
    fn palette_update_visible_next_frame() {
        let mut m = manager_with_two_scenes();
        let now = Instant::now();
        let before = m.render_frame(now).unwrap();
        assert_eq!(before[0], Rgb::new(255, 255, 255));
        m.update_palette_entry(0, 0, Rgb::new(10, 0, 0)).unwrap();
        let after = m.render_frame(now).unwrap();
        assert_eq!(after[0], Rgb::new(10, 0, 0));
    }

    #[test]
    fn palette_update_validates_indices() {
        let mut m = manager_with_two_scenes();
        assert!(matches!(
            m.update_palette_entry(0, 6, Rgb::BLACK),
            Err(SceneError::UnknownPaletteEntry { entry: 6 })
        ));
        assert!(matches!(
            m.update_palette_entry(4, 0, Rgb::BLACK),
            Err(SceneError::UnknownPalette { index: 4, .. })
        ));
    }

    #[test]
    fn select_dissolve_pattern_validates() {
        let mut m = manager_with_two_scenes();
        assert!(matches!(
            m.select_dissolve_pattern(0),
            Err(SceneError::UnknownPattern { index: 0, len: 0 })
        ));
        m.load_dissolves(DissolveSet::new(vec![DissolvePattern::default()]));
        assert!(m.select_dissolve_pattern(0).is_ok());
    }
}
