//! Effect compositor: overlay every segment of one effect onto a strip
//! buffer.
//!
//! Composition is overwrite in segment order. Transparency was already
//! folded into each rendered color, so a later segment always wins where it
//! overlaps an earlier one; "transparent" pixels paint black rather than
//! letting the underlying segment show through. Contributions that fall
//! outside `[0, led_count)` are discarded silently, which is also what
//! truncates a segment whose lengths exceed the strip.

use crate::renderer::render_segment;
use core_color::{Palette, Rgb};
use core_model::Scene;
use std::time::Instant;

/// Compose one `(effect, palette)` pair of `scene` into a fresh buffer of
/// `scene.led_count` colors.
///
/// A missing effect index produces an all-black frame; a missing palette
/// index resolves every color lookup to black. Neither is an error here:
/// the control channel validates indices, and render time only needs a safe
/// answer.
pub fn compose_effect(
    scene: &Scene,
    effect_index: usize,
    palette_index: usize,
    now: Instant,
) -> Vec<Rgb> {
    let mut buffer = vec![Rgb::BLACK; scene.led_count];
    let Some(effect) = scene.effect(effect_index) else {
        tracing::trace!(target: "render.compose", effect_index, "effect index out of range");
        return buffer;
    };
    let fallback = Palette::default();
    let palette = scene.palette(palette_index).unwrap_or(&fallback);
    for segment in &effect.segments {
        let contribution = render_segment(segment, palette, segment.elapsed_ms(now));
        let start = segment.current_position;
        for (offset, color) in contribution.into_iter().enumerate() {
            let strip_index = start + offset as i64;
            if strip_index >= 0 && (strip_index as usize) < buffer.len() {
                buffer[strip_index as usize] = color;
            }
        }
    }
    buffer
}
