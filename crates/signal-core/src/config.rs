use serde::Deserialize;
use thiserror::Error;

/// Tunables for the loop, persistence and the comms side channel.
/// Every field has a default, so a partial JSON document is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Local cache key holding the serialized save.
    pub storage_key: String,
    /// Minimum spacing between opportunistic remote writes (default: 45 s).
    pub remote_write_throttle_ms: u64,
    /// Offline gain is capped at this many seconds (default: 6 h).
    pub offline_cap_secs: f64,
    /// Shorter absences grant nothing (default: 3 s).
    pub offline_floor_secs: f64,
    /// Cooldown between event-driven comms calls (default: 180 s).
    pub ai_cooldown_ms: u64,
    /// Cooldown between ambient comms calls (default: 180 s).
    pub ambient_cooldown_ms: u64,
    /// The player counts as active this long after their last input (default: 20 s).
    pub afk_window_ms: u64,
    /// Minimum spacing between local autosaves of passive accrual (default: 5 s).
    pub autosave_interval_ms: u64,
    /// Rate of the slow cadence: HUD refresh, autosave and comms checks (default: 4 Hz).
    pub slow_tick_hz: f32,
    /// Longest frame delta credited in one tick, in seconds (default: 1).
    pub max_frame_dt: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            storage_key: "signal.save".to_string(),
            remote_write_throttle_ms: 45_000,
            offline_cap_secs: 6.0 * 3600.0,
            offline_floor_secs: 3.0,
            ai_cooldown_ms: 180_000,
            ambient_cooldown_ms: 180_000,
            afk_window_ms: 20_000,
            autosave_interval_ms: 5_000,
            slow_tick_hz: 4.0,
            max_frame_dt: 1.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl GameConfig {
    /// Parse a config document, then pull nonsensical values back to safe ones.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: GameConfig = serde_json::from_str(json)?;
        config.normalize();
        Ok(config)
    }

    fn normalize(&mut self) {
        let defaults = GameConfig::default();
        if self.storage_key.trim().is_empty() {
            self.storage_key = defaults.storage_key;
        }
        if !self.offline_cap_secs.is_finite() || self.offline_cap_secs < 0.0 {
            self.offline_cap_secs = defaults.offline_cap_secs;
        }
        if !self.offline_floor_secs.is_finite() || self.offline_floor_secs < 0.0 {
            self.offline_floor_secs = defaults.offline_floor_secs;
        }
        if !self.slow_tick_hz.is_finite() || self.slow_tick_hz <= 0.0 {
            self.slow_tick_hz = defaults.slow_tick_hz;
        }
        if !self.max_frame_dt.is_finite() || self.max_frame_dt <= 0.0 {
            self.max_frame_dt = defaults.max_frame_dt;
        }
    }

    pub fn slow_tick_dt(&self) -> f32 {
        1.0 / self.slow_tick_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = GameConfig::from_json("{}").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.remote_write_throttle_ms, 45_000);
        assert_eq!(config.offline_cap_secs, 21_600.0);
        assert_eq!(config.ai_cooldown_ms, 180_000);
        assert_eq!(config.afk_window_ms, 20_000);
    }

    #[test]
    fn partial_override() {
        let config = GameConfig::from_json(r#"{ "remote_write_throttle_ms": 1000, "storage_key": "dev" }"#).unwrap();
        assert_eq!(config.remote_write_throttle_ms, 1000);
        assert_eq!(config.storage_key, "dev");
        assert_eq!(config.offline_floor_secs, 3.0);
    }

    #[test]
    fn nonsense_values_are_normalized() {
        let config = GameConfig::from_json(r#"{ "slow_tick_hz": 0, "offline_cap_secs": -5, "storage_key": " " }"#).unwrap();
        assert_eq!(config.slow_tick_hz, 4.0);
        assert_eq!(config.offline_cap_secs, 21_600.0);
        assert_eq!(config.storage_key, "signal.save");
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(matches!(GameConfig::from_json("[1,"), Err(ConfigError::Parse(_))));
    }
}
