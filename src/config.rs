//! Workspace configuration
//!
//! Settings are read from a YAML file. The first of these that exists wins:
//!
//! 1. a path given explicitly (e.g. `kpc --config`)
//! 2. `.kpc.yaml` / `.kpc.yml` in the workspace root
//! 3. `<config dir>/kpc/config.yaml`
//!
//! Missing files fall back to [`KpcConfig::default`].

use crate::error::{KpcError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file names probed in the workspace root
pub const DEFAULT_CONFIG_FILES: &[&str] = &[".kpc.yaml", ".kpc.yml"];

/// KPC tooling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KpcConfig {
    /// Source file extension, without the dot
    #[serde(default = "default_extension")]
    pub file_extension: String,
    /// Directory names skipped when walking the workspace
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    /// Formatter settings
    #[serde(default)]
    pub format: FormatConfig,
    /// Default tracing filter
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Formatter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    #[serde(default = "default_tab_size")]
    pub tab_size: u32,
    #[serde(default = "default_insert_spaces")]
    pub insert_spaces: bool,
}

fn default_extension() -> String {
    "kpc".to_string()
}

fn default_exclude() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        "target".to_string(),
        ".git".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tab_size() -> u32 {
    4
}

fn default_insert_spaces() -> bool {
    true
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            tab_size: default_tab_size(),
            insert_spaces: default_insert_spaces(),
        }
    }
}

impl Default for KpcConfig {
    fn default() -> Self {
        Self {
            file_extension: default_extension(),
            exclude: default_exclude(),
            format: FormatConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl KpcConfig {
    /// Find a config file for the given workspace root
    pub fn find_config_file(root: &Path) -> Option<PathBuf> {
        for name in DEFAULT_CONFIG_FILES {
            let path = root.join(name);
            if path.exists() {
                return Some(path);
            }
        }

        let user = dirs::config_dir()?.join("kpc").join("config.yaml");
        user.exists().then_some(user)
    }

    /// Load configuration, falling back to defaults when no file exists
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(KpcError::InvalidConfig(format!(
                        "Config file does not exist: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => Self::find_config_file(root),
        };

        match path {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::parse_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse a config file from path
    pub fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Parse config from a YAML string
    pub fn parse_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| KpcError::InvalidConfig(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.file_extension.is_empty() || self.file_extension.starts_with('.') {
            return Err(KpcError::InvalidConfig(format!(
                "file_extension must be a bare extension, got {:?}",
                self.file_extension
            )));
        }
        if self.format.tab_size == 0 {
            return Err(KpcError::InvalidConfig(
                "format.tab_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The workspace glob this config selects, e.g. `**/*.kpc`
    pub fn glob(&self) -> String {
        format!("**/*.{}", self.file_extension)
    }
}
