pub mod generate;
pub mod parse;
pub mod types;

use std::path::{Path, PathBuf};

pub use parse::{load_config, ConfigError};
pub use types::{AggregationConfig, Config, FileStorageConfig, LogConfig, ServerConfig};

/// Resolves the config file path based on explicit argument or default locations.
/// Returns the first existing path from:
/// 1. Explicit path (if provided)
/// 2. ~/.config/logmill/config.yml
/// 3. /etc/logmill/config.yml
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/logmill/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/logmill/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
