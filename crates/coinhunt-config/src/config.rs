//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level game configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Network/multiplayer settings.
    pub network: NetworkConfig,
    /// First-person locomotion tuning.
    pub locomotion: LocomotionConfig,
    /// Collectible (coin) settings.
    pub collectible: CollectibleConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network/multiplayer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address a client joins.
    pub server_address: String,
    /// Port the host listens on and clients connect to.
    pub server_port: u16,
    /// Interval between outbound position syncs, in milliseconds.
    pub sync_interval_ms: u32,
    /// Display name announced to the host when joining.
    pub player_name: String,
}

/// Locomotion tuning. Units are meters and seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocomotionConfig {
    /// Planar speed below which an idle player snaps to a stop.
    pub stopping_speed: f32,
    /// Vertical acceleration (negative is down).
    pub gravity: f32,
    /// Base planar move speed.
    pub move_speed: f32,
    /// Lerp rate toward the target planar velocity.
    pub acceleration: f32,
    /// Vertical velocity added when a jump starts.
    pub jump_impulse_force: f32,
    /// Extra upward force while jump is held.
    pub jump_force: f32,
    /// Speed multiplier while sprinting.
    pub sprint_speed_multiplier: f32,
    /// Speed multiplier while crouching.
    pub crouch_speed_multiplier: f32,
    /// Capsule height scale while crouching.
    pub crouch_height_scale: f32,
    /// Vertical camera offset while crouching.
    pub crouch_camera_offset: f32,
    /// Forward check distance for the crouch ledge guard.
    pub crouch_ledge_check_distance: f32,
    /// Vertical tolerance for the crouch ledge guard.
    pub crouch_ledge_vertical_tolerance: f32,
    /// Horizontal dash speed.
    pub dash_speed: f32,
    /// Dash duration in seconds.
    pub dash_duration: f32,
    /// Dash cooldown in seconds.
    pub dash_cooldown: f32,
}

/// Collectible configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectibleConfig {
    /// Seconds a collected coin takes to reach its collector.
    pub collection_time_secs: f32,
    /// Radius within which a collector is detected.
    pub pickup_radius: f32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: 7777,
            sync_interval_ms: 50,
            player_name: "Player".to_string(),
        }
    }
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            stopping_speed: 1.0,
            gravity: -30.0,
            move_speed: 8.0,
            acceleration: 4.0,
            jump_impulse_force: 12.0,
            jump_force: 4.5,
            sprint_speed_multiplier: 1.5,
            crouch_speed_multiplier: 0.5,
            crouch_height_scale: 0.5,
            crouch_camera_offset: -0.6,
            crouch_ledge_check_distance: 0.45,
            crouch_ledge_vertical_tolerance: 0.75,
            dash_speed: 20.0,
            dash_duration: 0.25,
            dash_cooldown: 0.6,
        }
    }
}

impl Default for CollectibleConfig {
    fn default() -> Self {
        Self {
            collection_time_secs: 1.0,
            pickup_radius: 1.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Returns the platform config directory for coinhunt, if the platform has one.
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("coinhunt"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("server_port: 7777"));
        assert!(ron_str.contains("sync_interval_ms: 50"));
    }

    #[test]
    fn test_network_defaults_match_protocol() {
        let network = NetworkConfig::default();
        assert_eq!(network.server_address, "127.0.0.1");
        assert_eq!(network.server_port, 7777);
        assert_eq!(network.sync_interval_ms, 50);
    }

    #[test]
    fn test_locomotion_defaults_are_sane() {
        let loco = LocomotionConfig::default();
        assert!(loco.gravity < 0.0);
        assert!(loco.sprint_speed_multiplier > 1.0);
        assert!(loco.crouch_speed_multiplier < 1.0);
        assert!(loco.dash_cooldown > loco.dash_duration);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(network: (server_port: 9000))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.network.server_port, 9000);
        assert_eq!(config.network.server_address, "127.0.0.1");
        assert_eq!(config.locomotion, LocomotionConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.network.server_address = "10.0.0.1".to_string();
        config.locomotion.move_speed = 11.0;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.collectible.collection_time_secs = 2.5;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().collectible.collection_time_secs, 2.5);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
