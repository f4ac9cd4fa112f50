//! The system-constants oracle.
//!
//! A read-only lookup consulted after the user variable tree and the durable
//! store. All updates funnel through the few setters here; the engine refreshes
//! `CURRENTLINE` on every completed inbound line.

use core_value::Value;

#[derive(Debug, Default)]
pub struct SystemConstants {
    current_line: String,
    current_ansi_line: String,
    connected: bool,
    game: String,
}

impl SystemConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single entry point for inbound-line refresh: the stripped line plus
    /// the raw (ANSI-bearing) form it came from.
    pub fn update_current_line(&mut self, stripped: &str, raw: &str) {
        self.current_line = stripped.to_string();
        self.current_ansi_line = raw.to_string();
    }

    pub fn clear_current_line(&mut self) {
        self.current_line.clear();
        self.current_ansi_line.clear();
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn set_game(&mut self, game: &str) {
        self.game = game.to_string();
    }

    pub fn current_line(&self) -> &str {
        &self.current_line
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        match name.to_ascii_uppercase().as_str() {
            "CURRENTLINE" => Some(Value::Str(self.current_line.clone())),
            "CURRENTANSILINE" => Some(Value::Str(self.current_ansi_line.clone())),
            "CONNECTED" => Some(Value::from(self.connected)),
            "GAME" => Some(Value::Str(self.game.clone())),
            "DATE" => Some(Value::Str(
                chrono::Local::now().format("%m/%d/%Y").to_string(),
            )),
            "TIME" => Some(Value::Str(
                chrono::Local::now().format("%H:%M:%S").to_string(),
            )),
            "TRUE" => Some(Value::Num(1.0)),
            "FALSE" => Some(Value::Num(0.0)),
            _ => None,
        }
    }
}
