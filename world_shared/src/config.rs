//! Configuration system.
//!
//! Loads configuration from JSON strings/files (file IO left to app).
//! Binaries layer plain `--flag value` overrides on top.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server listen/connect address, e.g. `127.0.0.1:50051`.
    pub server_addr: String,
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    /// Path to the persisted world database (server only, optional).
    #[serde(default)]
    pub world_db: Option<String>,
    /// Character name (client only).
    #[serde(default = "default_character_name")]
    pub character_name: String,
}

fn default_character_name() -> String {
    "Wanderer".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:50051".to_string(),
            tick_hz: 10,
            world_db: None,
            character_name: default_character_name(),
        }
    }
}

impl Config {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// The fixed tick period derived from `tick_hz`.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = Config::from_json_str(r#"{"server_addr":"0.0.0.0:1234","tick_hz":20}"#).unwrap();
        assert_eq!(cfg.server_addr, "0.0.0.0:1234");
        assert_eq!(cfg.world_db, None);
        assert_eq!(cfg.character_name, "Wanderer");
        assert_eq!(cfg.tick_period(), Duration::from_millis(50));
    }
}
