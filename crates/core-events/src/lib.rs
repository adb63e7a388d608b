//! Engine command types, the command-queue policy, and runtime telemetry
//! counters.
//!
//! Channel policy: the control channel produces commands from an async
//! receive task; the render thread consumes them in a single drain at the
//! top of each frame. The queue is bounded: when a burst outruns one frame
//! of drain capacity the sender drops the overflow and counts it, because
//! a real-time loop would rather lose a stale knob tweak than stall the
//! receive task or grow without bound. With one producer and a full drain
//! every frame, commands that arrive between two frames become visible
//! together, never partially.

use core_color::Rgb;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;

/// Capacity of the control-command queue. Sized far above any realistic
/// between-frame burst; overflow indicates a runaway sender.
pub const COMMAND_CHANNEL_CAP: usize = 256;

// Telemetry counters, all relaxed: they are observability, not
// synchronization. Inspected by tests and logged periodically.
pub static OSC_DATAGRAMS: AtomicU64 = AtomicU64::new(0);
pub static OSC_DECODE_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static COMMANDS_ENQUEUED: AtomicU64 = AtomicU64::new(0);
pub static COMMANDS_REJECTED: AtomicU64 = AtomicU64::new(0);
pub static COMMANDS_DROPPED_FULL: AtomicU64 = AtomicU64::new(0);
pub static COMMANDS_DROPPED_CLOSED: AtomicU64 = AtomicU64::new(0);
pub static FRAMES_RENDERED: AtomicU64 = AtomicU64::new(0);
pub static FRAMES_EMITTED: AtomicU64 = AtomicU64::new(0);
pub static FRAMES_LATE: AtomicU64 = AtomicU64::new(0);
pub static DATAGRAM_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Typed control commands, one per control-channel address. Everything the
/// input worker can ask of the engine flows through this enum; the render
/// thread owns all the state they touch.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Replace the loaded show from a JSON file.
    LoadShow { path: PathBuf },
    /// Replace the dissolve pattern set from a JSON file.
    LoadDissolves { path: PathBuf },
    CacheScene(usize),
    CacheEffect(usize),
    CachePalette(usize),
    /// Dissolve from the active selection to the pending one.
    TriggerPattern,
    SelectDissolvePattern(usize),
    /// Raw value; the scene manager clamps to 0..=1023.
    SetSpeedPercent(i32),
    /// Raw value; the scene manager clamps to 0..=255.
    SetMasterBrightness(i32),
    Pause,
    Resume,
    /// Replace one palette entry of the active scene.
    UpdatePaletteEntry {
        palette: usize,
        entry: usize,
        rgb: Rgb,
    },
    /// Stop the render thread; sent by the binary on shutdown.
    Shutdown,
}

pub type CommandSender = Sender<EngineCommand>;
pub type CommandReceiver = Receiver<EngineCommand>;

/// The engine's single command queue.
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    bounded(COMMAND_CHANNEL_CAP)
}
