//! Configuration loader for rearm.
//!
//! Reads `rearm.toml` from the data directory and deserializes it into
//! [`RearmConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::{Path, PathBuf};

use rearm_types::config::RearmConfig;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "rearm.toml";

/// Resolve the data directory.
///
/// Priority:
/// 1. `REARM_DATA_DIR` environment variable
/// 2. `~/.rearm`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("REARM_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".rearm");
    }

    PathBuf::from(".rearm")
}

/// Load configuration from `{data_dir}/rearm.toml`.
///
/// - Missing file: [`RearmConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> RearmConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", config_path.display());
            return RearmConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return RearmConfig::default();
        }
    };

    match toml::from_str::<RearmConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            RearmConfig::default()
        }
    }
}
