//! Stateful heart of the engine: the scene manager owning the loaded show,
//! the active and pending selections, and the dissolve cross-fade that moves
//! between them.

pub mod dissolve;
pub mod manager;

pub use dissolve::{DissolveSource, DissolveState, RunningDissolve, merge_frames};
pub use manager::{SceneError, SceneManager};
