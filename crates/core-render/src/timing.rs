//! Frame timing instrumentation.
//!
//! The loop records how long each completed frame took; anything watching
//! the engine (tests, a future stats surface) reads it back without
//! touching loop state. Budget math lives here too so the loop and its
//! tests agree on what "late" means.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static LAST_FRAME_NS: AtomicU64 = AtomicU64::new(0);

/// Record the duration of the last completed frame in nanoseconds.
pub fn record_last_frame_ns(ns: u64) {
    LAST_FRAME_NS.store(ns, Ordering::Relaxed);
}

/// Fetch the last recorded frame duration in nanoseconds.
pub fn last_frame_ns() -> u64 {
    LAST_FRAME_NS.load(Ordering::Relaxed)
}

/// The wall-clock budget of one frame at `fps`. A zero fps (impossible after
/// validation) falls back to one frame per second rather than dividing by
/// zero.
pub fn frame_budget(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(fps.max(1)))
}
