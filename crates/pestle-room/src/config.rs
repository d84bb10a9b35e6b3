//! World configuration.

use pestle_protocol::Vec2;
use serde::{Deserialize, Serialize};

/// Configuration for a [`World`](crate::World).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Lower corner of the area new players spawn in.
    pub spawn_min: Vec2,

    /// Upper corner of the spawn area. Equal to `spawn_min` for a fixed
    /// spawn point.
    pub spawn_max: Vec2,

    /// Ticks a projectile lives before it removes itself.
    pub projectile_ttl_ticks: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            spawn_min: Vec2::new(-50.0, -50.0),
            spawn_max: Vec2::new(50.0, 50.0),
            projectile_ttl_ticks: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_config_default() {
        let config = WorldConfig::default();
        assert_eq!(config.projectile_ttl_ticks, 600);
        assert!(config.spawn_min.x <= config.spawn_max.x);
        assert!(config.spawn_min.y <= config.spawn_max.y);
    }
}
