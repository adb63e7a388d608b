//! Configuration loading and parsing.
//!
//! `lumen.toml` is discovered in the working directory unless the binary
//! passes an override path. Unknown fields are ignored (TOML
//! deserialization tolerance) so the file can grow without breaking older
//! builds. Every recognized value has a default, and out-of-range values
//! clamp with a warning rather than failing startup; an engine that drives
//! physical fixtures should come up even with a sloppy config.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "lumen.toml";

const FPS_RANGE: std::ops::RangeInclusive<u32> = 1..=240;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub osc: OscSection,
    #[serde(default)]
    pub destinations: Vec<DestinationEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSection {
    /// Frame rate used while no show is loaded (a loaded scene overrides).
    #[serde(default = "EngineSection::default_target_fps")]
    pub target_fps: u32,
    /// Strip size used while no show is loaded.
    #[serde(default = "EngineSection::default_led_count")]
    pub led_count: usize,
    /// Initial master brightness.
    #[serde(default = "EngineSection::default_master_brightness")]
    pub master_brightness: u16,
}

impl EngineSection {
    fn default_target_fps() -> u32 {
        40
    }
    fn default_led_count() -> usize {
        256
    }
    fn default_master_brightness() -> u16 {
        255
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            target_fps: Self::default_target_fps(),
            led_count: Self::default_led_count(),
            master_brightness: Self::default_master_brightness(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OscSection {
    #[serde(default = "OscSection::default_input_host")]
    pub input_host: String,
    #[serde(default = "OscSection::default_input_port")]
    pub input_port: u16,
    #[serde(default = "OscSection::default_output_address")]
    pub output_address: String,
}

impl OscSection {
    fn default_input_host() -> String {
        "0.0.0.0".to_string()
    }
    fn default_input_port() -> u16 {
        9000
    }
    fn default_output_address() -> String {
        "/light/serial".to_string()
    }
}

impl Default for OscSection {
    fn default() -> Self {
        Self {
            input_host: Self::default_input_host(),
            input_port: Self::default_input_port(),
            output_address: Self::default_output_address(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DestinationEntry {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub copy_mode: bool,
    #[serde(default)]
    pub start_led: usize,
    /// Inclusive; defaults to the configured strip end when absent.
    #[serde(default)]
    pub end_led: Option<usize>,
    #[serde(default = "DestinationEntry::default_enabled")]
    pub enabled: bool,
}

impl DestinationEntry {
    fn default_enabled() -> bool {
        true
    }
}

/// Effective configuration after parsing and clamping.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.file.osc.input_host, self.file.osc.input_port)
    }
}

/// Load configuration from `override_path`, or from `lumen.toml` in the
/// working directory, or fall back to pure defaults when neither exists.
/// A present-but-unparsable file is an error: silently ignoring a typo'd
/// config that the operator clearly intended is worse than refusing to
/// start.
pub fn load_from(override_path: Option<&Path>) -> Result<Config> {
    let path = override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE).to_path_buf());
    let file = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let parsed: ConfigFile =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        info!(target: "config", path = %path.display(), "configuration loaded");
        parsed
    } else {
        if override_path.is_some() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        info!(target: "config", "no config file, using defaults");
        ConfigFile::default()
    };
    Ok(clamp(file))
}

fn clamp(mut file: ConfigFile) -> Config {
    if !FPS_RANGE.contains(&file.engine.target_fps) {
        let clamped = file
            .engine
            .target_fps
            .clamp(*FPS_RANGE.start(), *FPS_RANGE.end());
        warn!(
            target: "config",
            requested = file.engine.target_fps,
            clamped,
            "target_fps out of range"
        );
        file.engine.target_fps = clamped;
    }
    if file.engine.led_count == 0 {
        warn!(target: "config", "led_count 0 raised to 1");
        file.engine.led_count = 1;
    }
    if file.engine.master_brightness > 255 {
        warn!(
            target: "config",
            requested = file.engine.master_brightness,
            "master_brightness clamped to 255"
        );
        file.engine.master_brightness = 255;
    }
    info!(
        target: "config",
        target_fps = file.engine.target_fps,
        led_count = file.engine.led_count,
        master_brightness = file.engine.master_brightness,
        destinations = file.destinations.len(),
        input = %format!("{}:{}", file.osc.input_host, file.osc.input_port),
        output_address = %file.osc.output_address,
        "effective configuration"
    );
    Config { file }
}
