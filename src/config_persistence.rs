//! Loading and writing `config.toml`.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::{sanitize_config, Config};

const APP_DIR_NAME: &str = "setlist-sync";
const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "setlists.db";

/// `<config_dir>/setlist-sync/config.toml`, when a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Database path from config, or `<data_dir>/setlist-sync/setlists.db`.
pub fn resolve_database_path(config: &Config) -> Option<PathBuf> {
    config.storage.database_path.clone().or_else(|| {
        dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME).join(DATABASE_FILE_NAME))
    })
}

pub fn save_config(path: &Path, config: &Config) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
    }
    let serialized =
        toml::to_string(config).map_err(|err| format!("failed to serialize config: {err}"))?;
    std::fs::write(path, serialized)
        .map_err(|err| format!("failed to write {}: {err}", path.display()))
}

/// Reads the config at `path`, writing defaults first when the file is missing.
/// Unreadable or malformed files fall back to defaults.
pub fn load_or_create_config(path: &Path) -> Config {
    if !path.exists() {
        let default_config = Config::default();
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Err(err) = save_config(path, &default_config) {
            warn!("Failed to write default config: {}", err);
        }
        return default_config;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read config {}: {}. Using defaults",
                path.display(),
                err
            );
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&content) {
        Ok(config) => sanitize_config(config),
        Err(err) => {
            warn!(
                "Failed to parse config {}: {}. Using defaults",
                path.display(),
                err
            );
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{load_or_create_config, save_config};
    use crate::config::Config;
    use std::path::PathBuf;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("setlist-sync-test-{}-{}", name, uuid::Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let path = temp_config_path("missing");
        let config = load_or_create_config(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(path.parent().expect("config has parent"));
    }

    #[test]
    fn test_saved_config_is_loaded_back() {
        let path = temp_config_path("saved");
        let mut config = Config::default();
        config.playback.debounce_ms = 450;
        config.lookup.enabled = false;
        save_config(&path, &config).expect("config should save");
        assert_eq!(load_or_create_config(&path), config);
        let _ = std::fs::remove_dir_all(path.parent().expect("config has parent"));
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let path = temp_config_path("malformed");
        std::fs::create_dir_all(path.parent().expect("config has parent"))
            .expect("temp dir should be creatable");
        std::fs::write(&path, "[playback\ndebounce_ms = ").expect("write should succeed");
        assert_eq!(load_or_create_config(&path), Config::default());
        let _ = std::fs::remove_dir_all(path.parent().expect("config has parent"));
    }
}
