//! The frame loop: fixed-cadence driver of the whole pipeline.
//!
//! Each tick runs in a strict order: drain the command queue, let the
//! scene manager render (movement, composition, dissolve merge, master
//! brightness), fan the frame out, then sleep off the remainder of the
//! frame budget. Draining completely before rendering is what makes command
//! application all-or-nothing per frame: two commands sent between ticks
//! are always visible together.
//!
//! The loop never propagates an error. Bad commands are logged and
//! dropped with state untouched, failed loads leave the previous show
//! playing, failed sends are the fan-out's problem. When the loop falls
//! behind its budget it drops the sleep instead of accumulating debt and
//! renders the next frame immediately.

use core_events::{
    COMMANDS_REJECTED, CommandReceiver, EngineCommand, FRAMES_EMITTED, FRAMES_LATE,
    FRAMES_RENDERED,
};
use core_model::{load_dissolve_file, load_show_file};
use core_output::{FanOut, FrameSink};
use core_render::timing;
use core_scene::SceneManager;
use crossbeam_channel::TryRecvError;
use std::ops::ControlFlow;
use std::sync::atomic::Ordering::Relaxed;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// An explicit `Shutdown` command arrived.
    Shutdown,
    /// Every command sender is gone; nothing can ever reach us again.
    ChannelClosed,
}

pub struct FrameLoop<S: FrameSink> {
    manager: SceneManager,
    fanout: FanOut<S>,
    commands: CommandReceiver,
}

impl<S: FrameSink> FrameLoop<S> {
    pub fn new(manager: SceneManager, fanout: FanOut<S>, commands: CommandReceiver) -> Self {
        Self {
            manager,
            fanout,
            commands,
        }
    }

    pub fn manager(&self) -> &SceneManager {
        &self.manager
    }

    pub fn into_parts(self) -> (SceneManager, FanOut<S>) {
        (self.manager, self.fanout)
    }

    /// Run until shutdown, sleeping between frames. Returns the exit reason
    /// together with the subsystems for inspection or reuse.
    pub fn run(mut self) -> (LoopExit, SceneManager, FanOut<S>) {
        info!(target: "render.loop", fps = self.manager.fps(), "frame loop started");
        let exit = loop {
            let frame_start = Instant::now();
            if let ControlFlow::Break(reason) = self.step(frame_start) {
                break reason;
            }
            let budget = timing::frame_budget(self.manager.fps());
            let spent = frame_start.elapsed();
            timing::record_last_frame_ns(spent.as_nanos() as u64);
            match budget.checked_sub(spent) {
                Some(remaining) => thread::sleep(remaining),
                None => {
                    FRAMES_LATE.fetch_add(1, Relaxed);
                    debug!(
                        target: "render.loop",
                        spent_us = spent.as_micros() as u64,
                        budget_us = budget.as_micros() as u64,
                        "frame over budget"
                    );
                }
            }
        };
        info!(target: "render.loop", reason = ?exit, "frame loop stopped");
        (exit, self.manager, self.fanout)
    }

    /// One frame at an explicit instant: drain commands, render, emit.
    /// Exposed so tests can drive virtual time without sleeping.
    pub fn step(&mut self, now: Instant) -> ControlFlow<LoopExit> {
        loop {
            match self.commands.try_recv() {
                Ok(EngineCommand::Shutdown) => return ControlFlow::Break(LoopExit::Shutdown),
                Ok(command) => self.apply(command, now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return ControlFlow::Break(LoopExit::ChannelClosed);
                }
            }
        }
        if let Some(frame) = self.manager.render_frame(now) {
            FRAMES_RENDERED.fetch_add(1, Relaxed);
            if self.fanout.emit(&frame) > 0 {
                FRAMES_EMITTED.fetch_add(1, Relaxed);
            }
        }
        ControlFlow::Continue(())
    }

    fn apply(&mut self, command: EngineCommand, now: Instant) {
        let result = match command {
            EngineCommand::LoadShow { path } => {
                match load_show_file(&path, now) {
                    Ok(show) => self.manager.load_show(show),
                    Err(error) => {
                        warn!(target: "render.loop", %error, "show load failed, keeping current show");
                    }
                }
                Ok(())
            }
            EngineCommand::LoadDissolves { path } => {
                match load_dissolve_file(&path) {
                    Ok(dissolves) => self.manager.load_dissolves(dissolves),
                    Err(error) => {
                        warn!(target: "render.loop", %error, "dissolve load failed, keeping current set");
                    }
                }
                Ok(())
            }
            EngineCommand::CacheScene(index) => self.manager.cache_scene(index),
            EngineCommand::CacheEffect(index) => self.manager.cache_effect(index),
            EngineCommand::CachePalette(index) => self.manager.cache_palette(index),
            EngineCommand::TriggerPattern => {
                self.manager.trigger_pattern(now);
                Ok(())
            }
            EngineCommand::SelectDissolvePattern(index) => {
                self.manager.select_dissolve_pattern(index)
            }
            EngineCommand::SetSpeedPercent(value) => {
                self.manager.set_speed_percent(value);
                Ok(())
            }
            EngineCommand::SetMasterBrightness(value) => {
                self.manager.set_master_brightness(value);
                Ok(())
            }
            EngineCommand::Pause => {
                self.manager.pause();
                Ok(())
            }
            EngineCommand::Resume => {
                self.manager.resume();
                Ok(())
            }
            EngineCommand::UpdatePaletteEntry {
                palette,
                entry,
                rgb,
            } => self.manager.update_palette_entry(palette, entry, rgb),
            // Handled in the drain; unreachable here but harmless.
            EngineCommand::Shutdown => Ok(()),
        };
        if let Err(error) = result {
            COMMANDS_REJECTED.fetch_add(1, Relaxed);
            warn!(target: "render.loop", %error, "command rejected");
        }
    }
}
