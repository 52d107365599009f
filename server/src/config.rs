//! Startup settings for the arena
//!
//! Settings are read once from a JSON file before the world is built and are
//! never reloaded. A missing or invalid file is fatal: the server refuses to
//! run with undefined world geometry.

use serde::Deserialize;
use shared::{Vector2D, WallRecord};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// One wall segment as written in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WallConfig {
    pub p1: Vector2D,
    pub p2: Vector2D,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub universe_size: u32,
    pub ms_per_frame: u64,
    pub fire_cooldown_ms: u64,
    pub respawn_rate_ms: u64,
    pub max_powerups: usize,
    pub walls: Vec<WallConfig>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            universe_size: 2000,
            ms_per_frame: 17,
            fire_cooldown_ms: 250,
            respawn_rate_ms: 3000,
            max_powerups: 5,
            walls: Vec::new(),
        }
    }
}

impl ServerSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: ServerSettings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe_size == 0 {
            return Err(ConfigError::Invalid("universe_size must be > 0".into()));
        }
        if self.ms_per_frame == 0 {
            return Err(ConfigError::Invalid("ms_per_frame must be > 0".into()));
        }
        for (i, wall) in self.walls.iter().enumerate() {
            if wall.p1.x != wall.p2.x && wall.p1.y != wall.p2.y {
                return Err(ConfigError::Invalid(format!(
                    "wall {} is not axis-aligned: ({}, {}) - ({}, {})",
                    i, wall.p1.x, wall.p1.y, wall.p2.x, wall.p2.y
                )));
            }
        }
        Ok(())
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.ms_per_frame)
    }

    pub fn fire_cooldown(&self) -> Duration {
        Duration::from_millis(self.fire_cooldown_ms)
    }

    pub fn respawn_delay(&self) -> Duration {
        Duration::from_millis(self.respawn_rate_ms)
    }

    /// Walls with their wire ids, numbered in file order.
    pub fn wall_records(&self) -> Vec<WallRecord> {
        self.walls
            .iter()
            .enumerate()
            .map(|(id, wall)| WallRecord {
                id: id as u32,
                p1: wall.p1,
                p2: wall.p2,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = ServerSettings::from_json(r#"{"universe_size": 1200}"#).unwrap();

        assert_eq!(settings.universe_size, 1200);
        assert_eq!(settings.ms_per_frame, 17);
        assert_eq!(settings.fire_cooldown(), Duration::from_millis(250));
        assert_eq!(settings.respawn_delay(), Duration::from_millis(3000));
        assert_eq!(settings.max_powerups, 5);
        assert!(settings.walls.is_empty());
    }

    #[test]
    fn test_walls_are_numbered_in_order() {
        let settings = ServerSettings::from_json(
            r#"{
                "walls": [
                    {"p1": {"x": -100, "y": -100}, "p2": {"x": 100, "y": -100}},
                    {"p1": {"x": 0, "y": 50}, "p2": {"x": 0, "y": 300}}
                ]
            }"#,
        )
        .unwrap();

        let walls = settings.wall_records();
        assert_eq!(walls.len(), 2);
        assert_eq!(walls[0].id, 0);
        assert_eq!(walls[0].p2, Vector2D::new(100.0, -100.0));
        assert_eq!(walls[1].id, 1);
        assert_eq!(walls[1].p1, Vector2D::new(0.0, 50.0));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        assert!(matches!(
            ServerSettings::from_json(r#"{"universe_size": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerSettings::from_json(r#"{"ms_per_frame": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerSettings::from_json(
                r#"{"walls": [{"p1": {"x": 0, "y": 0}, "p2": {"x": 10, "y": 10}}]}"#
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerSettings::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ServerSettings::load("/definitely/not/here/settings.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
