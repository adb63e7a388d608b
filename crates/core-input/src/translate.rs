//! OSC message to engine command translation.
//!
//! Pure and total: every malformed message maps to a typed rejection the
//! service logs as a warning. Structural ranges (palette addressing, RGB
//! components, negative indices) are enforced here; values the engine
//! clamps anyway (speed percent, master brightness) pass through raw.

use core_color::Rgb;
use core_events::EngineCommand;
use core_model::doc::ensure_json_extension;
use core_osc::{OscArg, OscMessage};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("unknown address {0}")]
    UnknownAddress(String),
    #[error("{address}: expected {expected} arguments, got {found}")]
    Arity {
        address: String,
        expected: usize,
        found: usize,
    },
    #[error("{address}: argument {index} has the wrong type")]
    ArgType { address: String, index: usize },
    #[error("{address}: value {value} out of range")]
    OutOfRange { address: String, value: i32 },
    #[error("palette address {0} must be /palette/<0-4|A-E>/<0-5>")]
    BadPaletteAddress(String),
}

/// Translate one decoded message into an engine command.
pub fn translate(msg: &OscMessage) -> Result<EngineCommand, TranslateError> {
    if let Some(rest) = msg.address.strip_prefix("/palette/") {
        return translate_palette_update(msg, rest);
    }
    match msg.address.as_str() {
        "/load_json" => {
            let path = expect_str(msg, 0, 1)?;
            Ok(EngineCommand::LoadShow {
                path: ensure_json_extension(&path),
            })
        }
        "/load_dissolve_json" => {
            let path = expect_str(msg, 0, 1)?;
            Ok(EngineCommand::LoadDissolves {
                path: PathBuf::from(path),
            })
        }
        "/change_scene" => Ok(EngineCommand::CacheScene(expect_index(msg)?)),
        "/change_effect" => Ok(EngineCommand::CacheEffect(expect_index(msg)?)),
        "/change_palette" => Ok(EngineCommand::CachePalette(expect_index(msg)?)),
        "/change_pattern" => {
            expect_arity(msg, 0)?;
            Ok(EngineCommand::TriggerPattern)
        }
        "/set_dissolve_pattern" => Ok(EngineCommand::SelectDissolvePattern(expect_index(msg)?)),
        "/set_speed_percent" => Ok(EngineCommand::SetSpeedPercent(expect_int(msg, 0, 1)?)),
        "/master_brightness" => Ok(EngineCommand::SetMasterBrightness(expect_int(msg, 0, 1)?)),
        "/pause" => {
            expect_arity(msg, 0)?;
            Ok(EngineCommand::Pause)
        }
        "/resume" => {
            expect_arity(msg, 0)?;
            Ok(EngineCommand::Resume)
        }
        other => Err(TranslateError::UnknownAddress(other.to_string())),
    }
}

/// `/palette/{pid}/{cid}` with `r g b` int arguments. `pid` is a digit
/// `0`–`4` or a letter `A`–`E` (case-insensitive); `cid` indexes the six
/// palette entries.
fn translate_palette_update(msg: &OscMessage, rest: &str) -> Result<EngineCommand, TranslateError> {
    let bad = || TranslateError::BadPaletteAddress(msg.address.clone());
    let mut parts = rest.split('/');
    let pid = parts.next().ok_or_else(bad)?;
    let cid = parts.next().ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }
    let palette = parse_palette_id(pid).ok_or_else(bad)?;
    let entry: usize = cid.parse().ok().filter(|&c| c < 6).ok_or_else(bad)?;
    expect_arity(msg, 3)?;
    let mut rgb = [0u8; 3];
    for (index, slot) in rgb.iter_mut().enumerate() {
        let value = int_arg(msg, index)?;
        if !(0..=255).contains(&value) {
            return Err(TranslateError::OutOfRange {
                address: msg.address.clone(),
                value,
            });
        }
        *slot = value as u8;
    }
    Ok(EngineCommand::UpdatePaletteEntry {
        palette,
        entry,
        rgb: Rgb::from(rgb),
    })
}

fn parse_palette_id(pid: &str) -> Option<usize> {
    let mut chars = pid.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    match c {
        '0'..='4' => Some(c as usize - '0' as usize),
        'A'..='E' => Some(c as usize - 'A' as usize),
        'a'..='e' => Some(c as usize - 'a' as usize),
        _ => None,
    }
}

fn expect_arity(msg: &OscMessage, expected: usize) -> Result<(), TranslateError> {
    if msg.args.len() != expected {
        return Err(TranslateError::Arity {
            address: msg.address.clone(),
            expected,
            found: msg.args.len(),
        });
    }
    Ok(())
}

fn int_arg(msg: &OscMessage, index: usize) -> Result<i32, TranslateError> {
    match msg.args.get(index) {
        Some(OscArg::Int(v)) => Ok(*v),
        _ => Err(TranslateError::ArgType {
            address: msg.address.clone(),
            index,
        }),
    }
}

fn expect_int(msg: &OscMessage, index: usize, arity: usize) -> Result<i32, TranslateError> {
    expect_arity(msg, arity)?;
    int_arg(msg, index)
}

fn expect_str(msg: &OscMessage, index: usize, arity: usize) -> Result<String, TranslateError> {
    expect_arity(msg, arity)?;
    match msg.args.get(index) {
        Some(OscArg::Str(s)) => Ok(s.clone()),
        _ => Err(TranslateError::ArgType {
            address: msg.address.clone(),
            index,
        }),
    }
}

/// Indices arrive as OSC int32; negatives are structurally invalid.
fn expect_index(msg: &OscMessage) -> Result<usize, TranslateError> {
    let value = expect_int(msg, 0, 1)?;
    if value < 0 {
        return Err(TranslateError::OutOfRange {
            address: msg.address.clone(),
            value,
        });
    }
    Ok(value as usize)
}
