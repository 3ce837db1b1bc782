use std::path::{Path, PathBuf};

use anyhow::Result;

use netlimit_core::{Config, ConfigPaths};

/// What `netlimit config` prints: the effective settings as TOML, or with
/// `show_path` the file they are read from.
pub fn render(config: &Config, config_path: &Path, show_path: bool) -> Result<String> {
    if show_path {
        return Ok(config_path.display().to_string());
    }
    config.to_toml_string()
}

/// Writes the default config, refusing to clobber an existing file unless
/// `force` is set. Returns where it was written.
pub fn init(path: Option<&Path>, force: bool, paths: &ConfigPaths) -> Result<PathBuf> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(|| paths.config_path.clone());
    if config_path.exists() && !force {
        return Err(anyhow::anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }
    Config::default_config().save(&config_path)?;
    Ok(config_path)
}
