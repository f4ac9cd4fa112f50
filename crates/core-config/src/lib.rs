//! Configuration loading and parsing.
//!
//! Parses `warpgate.toml` (or an override path provided by the binary).
//! Discovery order: explicit path, `./warpgate.toml`, then the user config
//! directory. A missing file yields defaults; a malformed file is an error
//! citing the path. Unknown fields are ignored so the format can grow without
//! breaking older configs.

use std::path::{Path, PathBuf};
use std::{fs, net::SocketAddr};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "warpgate.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Remote game server host.
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 23,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Local listen port for the terminal client.
    pub listen: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self { listen: 2300 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Base path for script files and their includes.
    pub base_path: Option<PathBuf>,
    /// Scripts loaded and started after connect.
    pub autorun: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `warpgate=debug`.
    pub level: String,
    /// Log directory; file logging is disabled when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub scripts: ScriptsConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.proxy.listen))
    }

    pub fn base_path(&self) -> PathBuf {
        self.scripts
            .base_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Load from an explicit path; the file must exist and parse.
pub fn load_from(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let config: Config = toml::from_str(&text)
        .with_context(|| format!("cannot parse config file {}", path.display()))?;
    info!(target: "config", path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Discover and load the configuration, falling back to defaults when no
/// file exists anywhere on the search path.
pub fn load(override_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = override_path {
        return load_from(path);
    }
    for candidate in search_paths() {
        if candidate.is_file() {
            return load_from(&candidate);
        }
    }
    info!(target: "config", "no configuration file found, using defaults");
    Ok(Config::default())
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("warpgate").join(CONFIG_FILE_NAME));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_sections_are_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 23);
        assert_eq!(config.proxy.listen, 2300);
        assert!(config.scripts.autorun.is_empty());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn full_round_trip_preserves_values() {
        let text = r#"
            [server]
            host = "twgs.example.com"
            port = 2002

            [proxy]
            listen = 2323

            [scripts]
            base_path = "scripts"
            autorun = ["login.ts", "mombot.ts"]

            [log]
            level = "warpgate=debug"
            dir = "logs"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.server_addr(), "twgs.example.com:2002");
        assert_eq!(config.proxy.listen, 2323);
        assert_eq!(config.base_path(), PathBuf::from("scripts"));
        assert_eq!(config.scripts.autorun.len(), 2);
        assert_eq!(config.log.dir, Some(PathBuf::from("logs")));
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let config: Config = toml::from_str("[server]\nhost = \"h\"\nfuture_knob = 9\n").unwrap();
        assert_eq!(config.server.host, "h");
    }

    #[test]
    fn malformed_file_errors_with_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[server\nhost=").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn load_from_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[server]\nhost = \"game.example\"\nport = 4000\n").unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.server_addr(), "game.example:4000");
    }
}
