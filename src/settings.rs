// Settings management and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use log::warn;

/// Editor preferences, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorSettings {
    /// Playback volume, 0.0 to 1.0.
    pub volume: f32,
    /// Interval between playback position updates.
    pub poll_interval_ms: u64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            poll_interval_ms: 50,
        }
    }
}

impl EditorSettings {
    /// Load settings from a JSON file, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("invalid settings file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EditorSettings::default();
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.poll_interval_ms, 50);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = EditorSettings {
            volume: 0.4,
            poll_interval_ms: 100,
        };
        settings.save(&path).unwrap();

        let loaded = EditorSettings::load(&path);
        assert_eq!(loaded.volume, 0.4);
        assert_eq!(loaded.poll_interval_ms, 100);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let loaded = EditorSettings::load("/nonexistent/settings.json");
        assert_eq!(loaded.volume, 1.0);
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        let loaded = EditorSettings::load(&path);
        assert_eq!(loaded.poll_interval_ms, 50);
    }
}
