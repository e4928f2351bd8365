//! YAML configuration files

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::audio::MixerConfig;

/// Load a YAML config, falling back to `T::default()`
///
/// A missing file is normal (first run) and only logged at info level; an
/// unreadable or malformed file is logged as a warning.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("No config at {:?}, using defaults", path);
            return T::default();
        }
        Err(e) => {
            log::warn!("Failed to read config {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("Failed to parse config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Write a config as YAML, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config {:?}", path))?;

    log::info!("Saved config to {:?}", path);
    Ok(())
}

/// Load a mixer config, replacing values no stream could use with defaults
pub fn load_mixer_config(path: &Path) -> MixerConfig {
    let config: MixerConfig = load_config(path);
    match config.validate() {
        Ok(()) => config,
        Err(e) => {
            log::warn!("Invalid mixer config in {:?}: {}, using defaults", path, e);
            MixerConfig::default()
        }
    }
}
