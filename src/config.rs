//! Relay configuration
//!
//! Built from defaults, then overridden by environment variables.

use crate::ardrone::ArDroneConfig;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Browser assets and the WebSocket control endpoint
    pub http_bind: SocketAddr,
    /// Framed control events from native input devices
    pub control_bind: SocketAddr,
    pub asset_dir: PathBuf,
    /// Command names removed from the standard catalog
    pub disabled_commands: Vec<String>,
    pub ardrone: ArDroneConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http_bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            control_bind: SocketAddr::from(([0, 0, 0, 0], 3001)),
            asset_dir: PathBuf::from("public"),
            disabled_commands: Vec::new(),
            ardrone: ArDroneConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = parsed::<SocketAddr, _>(&lookup, "GAMEPAD_HTTP_BIND")? {
            config.http_bind = bind;
        }
        if let Some(bind) = parsed::<SocketAddr, _>(&lookup, "GAMEPAD_CONTROL_BIND")? {
            config.control_bind = bind;
        }
        if let Some(dir) = lookup("GAMEPAD_ASSET_DIR") {
            config.asset_dir = PathBuf::from(dir);
        }
        if let Some(list) = lookup("GAMEPAD_DISABLED_COMMANDS") {
            config.disabled_commands = list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(address) = lookup("ARDRONE_IP") {
            config.ardrone.address = address;
        }
        if let Some(port) = parsed::<u16, _>(&lookup, "ARDRONE_AT_PORT")? {
            config.ardrone.at_port = port;
        }
        if let Some(port) = parsed::<u16, _>(&lookup, "ARDRONE_NAVDATA_PORT")? {
            config.ardrone.navdata_port = port;
        }
        if let Some(ms) = parsed::<u64, _>(&lookup, "ARDRONE_COMMAND_INTERVAL_MS")? {
            anyhow::ensure!(ms > 0, "ARDRONE_COMMAND_INTERVAL_MS must be positive");
            config.ardrone.command_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid {}: {:?}", key, raw))
        })
        .transpose()
}
