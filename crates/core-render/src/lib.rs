//! Pure rendering stages of the frame pipeline.
//!
//! Everything here is a function of its inputs: the movement integrator
//! mutates only the segment it is given, the segment renderer and effect
//! compositor mutate nothing at all. Stateful concerns (selections,
//! dissolves, pausing) live in `core-scene`; cadence and fan-out live in
//! `core-runtime`.

pub mod compositor;
pub mod motion;
pub mod renderer;
pub mod timing;

pub use compositor::compose_effect;
pub use motion::advance_segment;
pub use renderer::render_segment;
