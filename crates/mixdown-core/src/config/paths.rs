//! Standard locations for mixdown configuration

use std::path::PathBuf;

/// Directory name under the platform config dir
const APP_DIR: &str = "mixdown";

/// Default config file path
///
/// Returns `<config dir>/mixdown/config.yaml` (e.g. `~/.config/mixdown/config.yaml`
/// on Linux), or `./mixdown/config.yaml` when the platform has no config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_layout() {
        let path = default_config_path();
        assert!(path.ends_with("mixdown/config.yaml"));
    }
}
