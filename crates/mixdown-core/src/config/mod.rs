//! Configuration file handling
//!
//! ```ignore
//! use mixdown_core::config::{default_config_path, load_mixer_config, save_config};
//!
//! let path = default_config_path();
//! let config = load_mixer_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;

pub use io::{load_config, load_mixer_config, save_config};
pub use paths::default_config_path;
