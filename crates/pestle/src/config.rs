//! Server configuration.

use pestle_room::WorldConfig;
use pestle_tick::TickConfig;
use pestle_transport::ConnectionConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`ServerConfig::bind_addr`].
pub const ENV_BIND: &str = "PESTLE_BIND";

/// Environment variable overriding the tick rate in Hz.
pub const ENV_TICK_RATE: &str = "PESTLE_TICK_RATE";

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

/// Rules the dispatcher applies to client packets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Distance a projectile covers per tick.
    pub projectile_speed: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            projectile_speed: 0.2,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Everything a [`PestleServer`](crate::PestleServer) needs to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: String,

    /// Connected clients allowed at once. Sockets beyond this are closed
    /// right after accept.
    pub max_clients: usize,

    pub connection: ConnectionConfig,
    pub world: WorldConfig,
    pub tick: TickConfig,
    pub dispatch: DispatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            max_clients: 64,
            connection: ConnectionConfig::default(),
            world: WorldConfig::default(),
            tick: TickConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Applies [`ENV_BIND`] and [`ENV_TICK_RATE`] overrides.
    ///
    /// `lookup` is normally `|key| std::env::var(key).ok()`. A tick rate
    /// that doesn't parse is logged and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup(ENV_BIND) {
            self.bind_addr = addr;
        }
        if let Some(raw) = lookup(ENV_TICK_RATE) {
            match raw.trim().parse::<u32>() {
                Ok(rate) => self.tick.tick_rate_hz = rate,
                Err(e) => tracing::warn!(
                    var = ENV_TICK_RATE,
                    value = %raw,
                    error = %e,
                    "ignoring invalid tick rate"
                ),
            }
        }
        self
    }
}
