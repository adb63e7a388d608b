//! Dissolve cross-fade: per-LED blending of a source frame into a target
//! frame along the pattern's timing windows.
//!
//! The state machine has two shapes of source. A dissolve triggered from
//! rest fades away from the still-live active selection (re-rendered every
//! frame, so the source keeps animating underneath the fade). A dissolve
//! triggered while another is in flight fades away from a frozen snapshot
//! of the last merged frame, which is what the strip was actually showing
//! at that instant.

use core_color::{Rgb, interpolate_color};
use core_model::{DissolvePattern, Selection};
use std::time::Instant;

/// What the cross-fade departs from.
#[derive(Debug, Clone)]
pub enum DissolveSource {
    /// Fade from a live selection, composed fresh each frame.
    Selection(Selection),
    /// Fade from a frozen frame (dissolve replaced mid-flight).
    Snapshot(Vec<Rgb>),
}

#[derive(Debug, Clone)]
pub struct RunningDissolve {
    pub started: Instant,
    /// Snapshot of the pattern selected at trigger time; reloading the
    /// dissolve set mid-fade does not disturb a running transition.
    pub pattern: DissolvePattern,
    pub source: DissolveSource,
    pub target: Selection,
}

#[derive(Debug, Clone, Default)]
pub enum DissolveState {
    #[default]
    Idle,
    Running(RunningDissolve),
}

impl DissolveState {
    pub fn is_running(&self) -> bool {
        matches!(self, DissolveState::Running(_))
    }
}

/// Blend `source` and `target` into `out` at `elapsed_ms` after the trigger.
///
/// `out` is rebuilt to `target.len()`. LEDs without a pattern window
/// hard-switch to the target immediately; a source shorter than the target
/// reads as black. Returns `true` once every LED has completed its window,
/// at which point the caller promotes the target selection.
pub fn merge_frames(
    pattern: &DissolvePattern,
    elapsed_ms: u64,
    source: &[Rgb],
    target: &[Rgb],
    out: &mut Vec<Rgb>,
) -> bool {
    out.clear();
    out.reserve(target.len());
    let mut complete = true;
    for (led, &tgt) in target.iter().enumerate() {
        let src = source.get(led).copied().unwrap_or(Rgb::BLACK);
        let color = match pattern.window(led) {
            None => tgt,
            Some(w) if elapsed_ms >= w.end_ms() => tgt,
            Some(w) => {
                complete = false;
                if elapsed_ms < w.start_ms {
                    src
                } else if elapsed_ms < w.start_ms + w.fade_in_ms {
                    let f = (elapsed_ms - w.start_ms) as f32 / w.fade_in_ms as f32;
                    interpolate_color(src, tgt, f)
                } else if elapsed_ms < w.start_ms + w.fade_in_ms + w.hold_ms {
                    tgt
                } else {
                    // Documented fade-out: a brief return toward the source
                    // before the window closes on the target.
                    let into = elapsed_ms - w.start_ms - w.fade_in_ms - w.hold_ms;
                    let f = into as f32 / w.fade_out_ms as f32;
                    interpolate_color(tgt, src, f)
                }
            }
        };
        out.push(color);
    }
    complete
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::DissolveWindow;

    const WHITE: Rgb = Rgb::new(255, 255, 255);

    fn uniform_pattern(len: usize, window: DissolveWindow) -> DissolvePattern {
        DissolvePattern::new(vec![window; len])
    }

    #[test]
    fn before_start_shows_source() {
        let p = uniform_pattern(4, DissolveWindow::new(500, 1000, 0, 0));
        let src = vec![WHITE; 4];
        let tgt = vec![Rgb::BLACK; 4];
        let mut out = Vec::new();
        let complete = merge_frames(&p, 100, &src, &tgt, &mut out);
        assert!(!complete);
        assert_eq!(out, src);
    }

    #[test]
    fn midpoint_blends_halfway() {
        let p = uniform_pattern(2, DissolveWindow::new(0, 1000, 0, 0));
        let src = vec![Rgb::new(200, 0, 100); 2];
        let tgt = vec![Rgb::new(0, 200, 100); 2];
        let mut out = Vec::new();
        let complete = merge_frames(&p, 500, &src, &tgt, &mut out);
        assert!(!complete);
        assert_eq!(out, vec![Rgb::new(100, 100, 100); 2]);
    }

    #[test]
    fn completion_lands_on_target() {
        let p = uniform_pattern(3, DissolveWindow::new(0, 1000, 0, 0));
        let src = vec![WHITE; 3];
        let tgt = vec![Rgb::new(10, 20, 30); 3];
        let mut out = Vec::new();
        assert!(merge_frames(&p, 1000, &src, &tgt, &mut out));
        assert_eq!(out, tgt);
    }

    #[test]
    fn hold_phase_shows_target_before_completion() {
        let p = uniform_pattern(1, DissolveWindow::new(0, 100, 1000, 100));
        let src = vec![WHITE];
        let tgt = vec![Rgb::BLACK];
        let mut out = Vec::new();
        let complete = merge_frames(&p, 500, &src, &tgt, &mut out);
        assert!(!complete);
        assert_eq!(out, tgt);
    }

    #[test]
    fn fade_out_returns_toward_source() {
        let p = uniform_pattern(1, DissolveWindow::new(0, 100, 0, 1000));
        let src = vec![Rgb::new(200, 200, 200)];
        let tgt = vec![Rgb::BLACK];
        let mut out = Vec::new();
        // 100ms fade-in done; 500ms into the 1000ms fade-out.
        let complete = merge_frames(&p, 600, &src, &tgt, &mut out);
        assert!(!complete);
        assert_eq!(out, vec![Rgb::new(100, 100, 100)]);
    }

    #[test]
    fn uncovered_leds_hard_switch() {
        let p = uniform_pattern(1, DissolveWindow::new(0, 1000, 0, 0));
        let src = vec![WHITE; 3];
        let tgt = vec![Rgb::new(9, 9, 9); 3];
        let mut out = Vec::new();
        merge_frames(&p, 0, &src, &tgt, &mut out);
        assert_eq!(out[0], WHITE);
        assert_eq!(out[1], Rgb::new(9, 9, 9));
        assert_eq!(out[2], Rgb::new(9, 9, 9));
    }

    #[test]
    fn empty_pattern_completes_immediately() {
        let p = DissolvePattern::default();
        let src = vec![WHITE; 2];
        let tgt = vec![Rgb::BLACK; 2];
        let mut out = Vec::new();
        assert!(merge_frames(&p, 0, &src, &tgt, &mut out));
        assert_eq!(out, tgt);
    }

    #[test]
    fn short_source_reads_black() {
        let p = uniform_pattern(2, DissolveWindow::new(0, 0, 0, 0));
        let src = vec![WHITE];
        let tgt = vec![Rgb::new(5, 5, 5); 2];
        let mut out = Vec::new();
        assert!(merge_frames(&p, 0, &src, &tgt, &mut out));
        assert_eq!(out, tgt);
    }

    #[test]
    fn staggered_windows_complete_with_latest() {
        let p = DissolvePattern::new(vec![
            DissolveWindow::new(0, 100, 0, 0),
            DissolveWindow::new(500, 100, 0, 0),
        ]);
        let src = vec![WHITE; 2];
        let tgt = vec![Rgb::BLACK; 2];
        let mut out = Vec::new();
        assert!(!merge_frames(&p, 200, &src, &tgt, &mut out));
        assert_eq!(out[0], Rgb::BLACK, "first LED already switched");
        assert_eq!(out[1], WHITE, "second LED still waiting");
        assert!(merge_frames(&p, 600, &src, &tgt, &mut out));
    }
}
