//! Configuration file loader for the `.research-kit/` directory.

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::models::AppConfig;
use std::path::Path;
use tracing::debug;

/// Directory under the project root holding the configuration file.
pub const CONFIG_DIR: &str = ".research-kit";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Load the application configuration from `<root>/.research-kit/config.toml`.
///
/// A missing directory or file yields the default configuration rather than
/// an error; a present but malformed file is reported with its path.
pub fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let path = root.join(CONFIG_DIR).join(CONFIG_FILE);

    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::FileRead {
        path: path.clone(),
        source,
    })?;

    let config: AppConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse { path, source })?;

    Ok(config)
}
