//! Lumen entrypoint: configuration, logging, worker wiring, shutdown.
//!
//! The binary owns process concerns only. It loads `lumen.toml`, preloads
//! any show/dissolve files named on the command line, binds the control and
//! output sockets, then hands everything to the two workers the engine runs
//! on: the async OSC receive task and the dedicated render thread. After
//! that its one remaining job is to translate ctrl-c into an orderly stop.

use anyhow::{Context, Result};
use clap::Parser;
use core_config::Config;
use core_events::{EngineCommand, command_channel};
use core_input::spawn_osc_receiver;
use core_model::{load_dissolve_file, load_show_file};
use core_output::{Destination, FanOut, UdpSink};
use core_runtime::FrameLoop;
use core_scene::SceneManager;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "LED animation playback engine")]
struct Args {
    /// Show JSON to load at startup; until one is loaded (here or over the
    /// control channel) the engine emits black frames.
    pub show: Option<PathBuf>,
    /// Dissolve pattern JSON to load at startup.
    #[arg(long = "dissolves")]
    pub dissolves: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `lumen.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Directory for `lumen.log` (defaults to the working directory).
    #[arg(long = "log-dir")]
    pub log_dir: Option<PathBuf>,
}

fn init_logging(log_dir: Option<&Path>) -> Result<WorkerGuard> {
    let dir = log_dir.unwrap_or_else(|| Path::new("."));
    let appender = tracing_appender::rolling::never(dir, "lumen.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(target: "runtime", %info, "panic");
        default_hook(info);
    }));
}

/// Resolve the configured destination table, skipping entries whose address
/// does not parse; a typo'd controller must not take the rig down.
fn build_destinations(config: &Config) -> Vec<Destination> {
    let default_end = config.file.engine.led_count.saturating_sub(1);
    let mut out = Vec::with_capacity(config.file.destinations.len());
    for entry in &config.file.destinations {
        let ip: IpAddr = match entry.ip.parse() {
            Ok(ip) => ip,
            Err(error) => {
                warn!(target: "config", ip = %entry.ip, %error, "skipping destination with bad ip");
                continue;
            }
        };
        out.push(Destination {
            addr: SocketAddr::new(ip, entry.port),
            copy_mode: entry.copy_mode,
            start_led: entry.start_led,
            end_led: entry.end_led.unwrap_or(default_end),
            enabled: entry.enabled,
        });
    }
    out
}

fn preload(manager: &mut SceneManager, args: &Args) {
    if let Some(path) = &args.show {
        match load_show_file(path, Instant::now()) {
            Ok(show) => manager.load_show(show),
            Err(error) => {
                warn!(target: "runtime", path = %path.display(), %error, "startup show load failed")
            }
        }
    }
    if let Some(path) = &args.dissolves {
        match load_dissolve_file(path) {
            Ok(dissolves) => manager.load_dissolves(dissolves),
            Err(error) => {
                warn!(target: "runtime", path = %path.display(), %error, "startup dissolve load failed")
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_dir.as_deref())?;
    install_panic_hook();
    info!(target: "runtime", version = env!("CARGO_PKG_VERSION"), "startup");

    let config = core_config::load_from(args.config.as_deref())?;
    let engine_cfg = &config.file.engine;
    let mut manager = SceneManager::new(
        engine_cfg.led_count,
        engine_cfg.target_fps,
        engine_cfg.master_brightness.min(255) as u8,
    );
    preload(&mut manager, &args);

    let destinations = build_destinations(&config);
    if destinations.is_empty() {
        warn!(target: "runtime", "no destinations configured, frames will go nowhere");
    }
    let sink = UdpSink::bind().context("binding output socket")?;
    let fanout = FanOut::new(sink, destinations, config.file.osc.output_address.clone());

    let (commands, command_feed) = command_channel();
    let (input_task, input_shutdown, control_addr) =
        spawn_osc_receiver(&config.bind_addr(), commands.clone())
            .await
            .with_context(|| format!("binding control socket {}", config.bind_addr()))?;
    info!(target: "runtime", %control_addr, "control channel ready");

    let render_thread = std::thread::Builder::new()
        .name("render".to_string())
        .spawn(move || FrameLoop::new(manager, fanout, command_feed).run())
        .context("spawning render thread")?;

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!(target: "runtime", "interrupt received, shutting down");

    input_shutdown.signal();
    if let Err(error) = commands.send(EngineCommand::Shutdown) {
        warn!(target: "runtime", %error, "render thread already gone");
    }
    if let Err(error) = input_task.await {
        warn!(target: "runtime", %error, "input task join failed");
    }
    match render_thread.join() {
        Ok((exit, _manager, _fanout)) => info!(target: "runtime", ?exit, "render thread stopped"),
        Err(_) => error!(target: "runtime", "render thread panicked"),
    }
    Ok(())
}
