//! The script engine: a registry of loaded scripts and the fan-out point for
//! the inbound and outbound text streams.
//!
//! Inbound flow: raw bytes -> raw taps (game detection and friends) -> the
//! chunk-safe ANSI stripper -> line assembly -> every running VM's
//! `process_incoming_text`, complete lines first, then the partial tail.
//! Errors inside one script never disturb the others.

mod engine;

pub use engine::{Engine, EngineError, ScriptInfo};
