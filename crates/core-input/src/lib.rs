//! Control-channel input: the UDP receive task and the pure translation
//! layer that turns decoded OSC messages into typed engine commands.

pub mod service;
pub mod translate;

pub use service::{OscShutdown, spawn_osc_receiver};
pub use translate::{TranslateError, translate};
