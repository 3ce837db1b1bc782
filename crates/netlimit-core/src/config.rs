use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Name of the QoS policy owned by this tool.
pub const QOS_POLICY_NAME: &str = "NetLimit";
/// Display name of the inbound firewall block rule owned by this tool.
pub const FIREWALL_RULE_IN: &str = "NetLimit_Block_IN";
/// Display name of the outbound firewall block rule owned by this tool.
pub const FIREWALL_RULE_OUT: &str = "NetLimit_Block_OUT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub shell: ShellConfig,
    pub resolver: ResolverConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    pub program: String,
    pub no_window: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub warn_on_multiple_matches: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub console_log_file: String,
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            shell: ShellConfig {
                program: "powershell".to_string(),
                no_window: true,
            },
            resolver: ResolverConfig {
                warn_on_multiple_matches: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                console_log_file: "console.log".to_string(),
            },
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let output = toml::to_string_pretty(self).context("render config TOML")?;
        Ok(output)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config at {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Loads the config at `path`, or the default location. A missing default
    /// file is not an error; an explicitly named one is.
    pub fn load_or_default(path: Option<&Path>, paths: &ConfigPaths) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if paths.config_path.exists() => Self::load(&paths.config_path),
            None => Ok(Self::default_config()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let contents = self.to_toml_string()?;
        fs::write(path, contents).with_context(|| format!("write config at {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.shell.program.trim().is_empty() {
            return Err(crate::NetLimitError::InvalidConfig(
                "shell.program must not be empty".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ConfigPaths {
    pub fn resolve() -> Result<Self> {
        let project_dirs = ProjectDirs::from("io", "netlimit", "netlimit")
            .ok_or_else(|| anyhow::anyhow!("unable to determine project directories"))?;
        Ok(Self {
            config_path: project_dirs.config_dir().join("config.toml"),
            data_dir: project_dirs.data_dir().to_path_buf(),
        })
    }

    pub fn console_log_path(&self, config: &Config) -> PathBuf {
        self.data_dir.join(&config.logging.console_log_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_in(dir: &Path) -> ConfigPaths {
        ConfigPaths {
            config_path: dir.join("config.toml"),
            data_dir: dir.join("data"),
        }
    }

    #[test]
    fn test_default_roundtrips_through_toml() {
        let rendered = Config::default_config().to_toml_string().unwrap();
        let parsed = Config::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed.shell.program, "powershell");
        assert!(parsed.resolver.warn_on_multiple_matches);
    }

    #[test]
    fn test_empty_shell_program_rejected() {
        let contents = r#"
[shell]
program = "  "
no_window = true

[resolver]
warn_on_multiple_matches = false

[logging]
level = "debug"
console_log_file = "console.log"
"#;
        assert!(Config::from_toml_str(contents).is_err());
    }

    #[test]
    fn test_missing_default_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        let config = Config::load_or_default(None, &paths).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        let explicit = dir.path().join("nope.toml");
        assert!(Config::load_or_default(Some(&explicit), &paths).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(dir.path());
        let mut config = Config::default_config();
        config.shell.program = "pwsh".to_string();
        config.save(&paths.config_path).unwrap();

        let loaded = Config::load_or_default(None, &paths).unwrap();
        assert_eq!(loaded.shell.program, "pwsh");
        assert_eq!(
            paths.console_log_path(&loaded),
            dir.path().join("data").join("console.log")
        );
    }
}
