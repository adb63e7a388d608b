//! Segment renderer: one segment's parameters to an ordered list of LED
//! colors at a point in time.
//!
//! A segment is a run of "parts", each spanning `length[k]` LEDs between
//! color point `k` and color point `k+1`. When the next color point exists,
//! color and transparency are interpolated across the part; a part whose
//! color point is the last one renders solid. Color points beyond the last
//! length entry each contribute one solid trailing LED. The dimmer envelope
//! scales everything; at zero brightness the segment contributes nothing at
//! all (not black; the compositor never sees it).

use core_color::{Palette, Rgb, calculate_segment_color, interpolate_color, interpolate_transparency};
use core_model::Segment;

/// Render one segment against `palette` at `elapsed_ms` since its birth.
///
/// The emitted length is `segment.rendered_len()` whenever the dimmer value
/// is positive, and zero otherwise.
pub fn render_segment(segment: &Segment, palette: &Palette, elapsed_ms: i64) -> Vec<Rgb> {
    let brightness = segment.dimmer.value_at(elapsed_ms);
    if brightness <= 0.0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(segment.rendered_len());
    let points = segment.color.len();
    for (k, &part_len) in segment.length.iter().enumerate() {
        let part_len = part_len as usize;
        if part_len == 0 {
            continue;
        }
        let color_index = segment.color.get(k).copied().unwrap_or(0);
        let tau = transparency_at(segment, k);
        let from = palette.color(color_index);
        let next = if k + 1 < points {
            Some((palette.color(segment.color[k + 1]), transparency_at(segment, k + 1)))
        } else {
            None
        };
        for j in 0..part_len {
            let (color, transparency) = match next {
                Some((to, tau_next)) if part_len > 1 => {
                    let f = j as f32 / (part_len - 1) as f32;
                    (
                        interpolate_color(from, to, f),
                        interpolate_transparency(tau, tau_next, f),
                    )
                }
                _ => (from, tau),
            };
            out.push(calculate_segment_color(color, transparency, brightness));
        }
    }
    // Color points past the length table: one solid LED each.
    for k in segment.length.len()..points {
        let color = palette.color(segment.color[k]);
        out.push(calculate_segment_color(color, transparency_at(segment, k), brightness));
    }
    out
}

fn transparency_at(segment: &Segment, k: usize) -> f32 {
    segment.transparency.get(k).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{DimmerEnvelope, DimmerStep, MoveRange};
    use std::time::Instant;

    fn palette() -> Palette {
        Palette::new([
            Rgb::new(255, 0, 0),
            Rgb::new(0, 0, 255),
            Rgb::new(255, 255, 255),
            Rgb::new(0, 255, 0),
            Rgb::new(10, 20, 30),
            Rgb::new(40, 50, 60),
        ])
    }

    fn segment(color: Vec<usize>, transparency: Vec<f32>, length: Vec<u32>) -> Segment {
        Segment {
            segment_id: 0,
            color,
            transparency,
            length,
            move_speed: 0.0,
            move_range: MoveRange::new(0, 99),
            initial_position: 0,
            current_position: 0,
            is_edge_reflect: false,
            dimmer: DimmerEnvelope::constant(),
            born_at: Instant::now(),
            fractional: 0.0,
        }
    }

    #[test]
    fn gradient_part_matches_fixed_points() {
        let s = segment(vec![0, 1], vec![0.0, 0.0], vec![5]);
        let out = render_segment(&s, &palette(), 0);
        assert_eq!(
            out,
            vec![
                Rgb::new(255, 0, 0),
                Rgb::new(191, 0, 63),
                Rgb::new(127, 0, 127),
                Rgb::new(63, 0, 191),
                Rgb::new(0, 0, 255),
            ]
        );
    }

    #[test]
    fn full_transparency_renders_black_not_nothing() {
        let s = segment(vec![2], vec![1.0], vec![4]);
        let out = render_segment(&s, &palette(), 0);
        assert_eq!(out, vec![Rgb::BLACK; 4]);
    }

    #[test]
    fn last_part_is_solid_without_next_point() {
        let s = segment(vec![2], vec![0.0], vec![3]);
        let out = render_segment(&s, &palette(), 0);
        assert_eq!(out, vec![Rgb::new(255, 255, 255); 3]);
    }

    #[test]
    fn trailing_color_points_emit_single_leds() {
        let s = segment(vec![0, 1, 2, 3], vec![0.0; 4], vec![2]);
        let out = render_segment(&s, &palette(), 0);
        // Part 0 interpolates 0 -> 1 over two LEDs, then three trailing solids.
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], Rgb::new(255, 0, 0));
        assert_eq!(out[1], Rgb::new(0, 0, 255));
        assert_eq!(out[2], Rgb::new(0, 0, 255));
        assert_eq!(out[3], Rgb::new(255, 255, 255));
        assert_eq!(out[4], Rgb::new(0, 255, 0));
    }

    #[test]
    fn single_led_part_takes_start_point() {
        let s = segment(vec![0, 1], vec![0.0, 0.0], vec![1, 1]);
        let out = render_segment(&s, &palette(), 0);
        assert_eq!(out, vec![Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)]);
    }

    #[test]
    fn zero_length_part_skipped() {
        let s = segment(vec![0, 1, 2], vec![0.0; 3], vec![2, 0]);
        let out = render_segment(&s, &palette(), 0);
        // Part 0 spans two LEDs, part 1 is empty, point 2 trails solo.
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], Rgb::new(255, 255, 255));
    }

    #[test]
    fn transparency_interpolates_across_part() {
        let s = segment(vec![2, 2], vec![0.0, 1.0], vec![3]);
        let out = render_segment(&s, &palette(), 0);
        assert_eq!(out[0], Rgb::new(255, 255, 255));
        assert_eq!(out[1], Rgb::new(127, 127, 127));
        assert_eq!(out[2], Rgb::BLACK);
    }

    #[test]
    fn dark_dimmer_phase_suppresses_contribution() {
        let mut s = segment(vec![0], vec![0.0], vec![5]);
        s.dimmer = DimmerEnvelope::new(vec![
            DimmerStep::new(100, 0, 0),
            DimmerStep::new(100, 100, 100),
        ]);
        assert!(render_segment(&s, &palette(), 50).is_empty());
        assert_eq!(render_segment(&s, &palette(), 150).len(), 5);
    }

    #[test]
    fn dimmer_scales_output() {
        let mut s = segment(vec![2], vec![0.0], vec![1]);
        s.dimmer = DimmerEnvelope::new(vec![DimmerStep::new(1000, 50, 50)]);
        let out = render_segment(&s, &palette(), 200);
        assert_eq!(out, vec![Rgb::new(127, 127, 127)]);
    }

    #[test]
    fn out_of_palette_color_index_renders_black() {
        let s = segment(vec![9], vec![0.0], vec![2]);
        let out = render_segment(&s, &palette(), 0);
        assert_eq!(out, vec![Rgb::BLACK; 2]);
    }
}
