//! CLI configuration management

use anyhow::{Context, Result, anyhow};
use engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Engine sections (`[tools]`, `[timeouts]`, `[privilege]`, `[sysfs]`,
    /// `[discovery]`) live at the top level of the file
    #[serde(flatten)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "warn".to_string()
    }
}

impl AppConfig {
    /// Load configuration from the specified path, or from the first
    /// standard location that exists
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => expand(&p),
            None => Self::find_config_file()
                .ok_or_else(|| anyhow!("No configuration file found"))?,
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.expand_paths();
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        tracing::debug!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load the first standard config file, or defaults when none exists.
    /// A file that exists but does not parse or validate is an error.
    pub fn load_or_default() -> Result<Self> {
        Self::load_first(&Self::candidate_paths())
    }

    fn load_first(candidates: &[PathBuf]) -> Result<Self> {
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load(Some(path.clone())),
            None => Ok(Self::default()),
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::candidate_paths().into_iter().find(|p| p.exists())
    }

    /// Standard locations, in search order
    fn candidate_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/usbip-share/config.toml"),
        ]
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbip-share").join("config.toml")
        } else {
            PathBuf::from(".config/usbip-share/config.toml")
        }
    }

    fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        self.engine.validate()?;
        Ok(())
    }

    /// Expand `~` in every configured path
    fn expand_paths(&mut self) {
        let tools = &mut self.engine.tools;
        for path in [&mut tools.usbip, &mut tools.lsusb, &mut tools.doctor_script]
            .into_iter()
            .flatten()
        {
            *path = expand(path);
        }
        let sysfs = &mut self.engine.sysfs;
        sysfs.driver_dir = expand(&sysfs.driver_dir);
        sysfs.devices_dir = expand(&sysfs.devices_dir);
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
