//! # Loader Configuration
//!
//! [`LoaderConfig`] controls where libraries are searched for, which extra
//! libraries the setup pass loads after "Default", and the policies for
//! duplicate loads, unknown unloads and state injection. Config files may be
//! JSON, YAML (`yaml-config` feature) or TOML (`toml-config` feature); the
//! format is picked from the file extension.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dynlibs_api::DEFAULT_INTERFACE;

use crate::constants::{CONFIG_ENV_VAR, DEFAULT_SEARCH_DIR, LIBRARY_DIR_ENV_VAR};
use crate::loader::error::{LoaderError, Result};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// What loading an already registered name does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The new binding replaces the old one; the old instance is released.
    #[default]
    Replace,
    /// The load fails with `AlreadyLoaded` and the registry is untouched.
    Reject,
}

/// What happens to the replaced registry when state is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectPolicy {
    /// Previous entries are dropped; anything the blob does not share is
    /// destroyed and its library closed.
    #[default]
    ReleasePrevious,
    /// Previous entries are leaked and stay resident for the process lifetime.
    Orphan,
}

/// An extra library the setup pass loads, and the interface it must implement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySpec {
    pub name: String,
    #[serde(default = "default_interface_id")]
    pub interface: String,
}

impl LibrarySpec {
    pub fn new(name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interface: interface.into(),
        }
    }
}

fn default_interface_id() -> String {
    DEFAULT_INTERFACE.to_string_lossy().into_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directories searched in order. Empty defers to the OS search path.
    pub search_dirs: Vec<PathBuf>,
    /// Loaded after "Default", in order.
    pub libraries: Vec<LibrarySpec>,
    pub on_duplicate: DuplicatePolicy,
    /// Unloading an unknown name fails instead of being a no-op.
    pub strict_unload: bool,
    pub on_inject: InjectPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_dirs: vec![PathBuf::from(DEFAULT_SEARCH_DIR)],
            libraries: Vec::new(),
            on_duplicate: DuplicatePolicy::default(),
            strict_unload: false,
            on_inject: InjectPolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Load a config file, picking the format from its extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| LoaderError::ConfigError {
            path: path.to_path_buf(),
            message: "unknown or unsupported config format".to_string(),
            source: None,
        })?;
        let content = fs::read_to_string(path).map_err(|e| LoaderError::ConfigError {
            path: path.to_path_buf(),
            message: "failed to read config file".to_string(),
            source: Some(Box::new(e)),
        })?;
        let config = Self::parse(&content, format).map_err(|e| match e {
            LoaderError::ConfigError { message, source, .. } => LoaderError::ConfigError {
                path: path.to_path_buf(),
                message,
                source,
            },
            other => other,
        })?;
        log::debug!("Loaded loader config from {}", path.display());
        Ok(config)
    }

    /// Parse config text in the given format.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let parse_error = |e: Box<dyn std::error::Error + Send + Sync>| LoaderError::ConfigError {
            path: PathBuf::new(),
            message: format!("failed to parse {} config", format.extension()),
            source: Some(e),
        };
        match format {
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(Box::new(e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(Box::new(e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(Box::new(e))),
        }
    }

    /// Config for `create()`: [`CONFIG_ENV_VAR`] names a file, and
    /// [`LIBRARY_DIR_ENV_VAR`] puts a directory at the front of the search path.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(dir) = lookup(LIBRARY_DIR_ENV_VAR).filter(|v| !v.is_empty()) {
            config = config.with_search_dir(dir);
        }
        Ok(config)
    }

    /// Put `dir` at the front of the search path.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.insert(0, dir.into());
        self
    }

    pub fn with_library(mut self, spec: LibrarySpec) -> Self {
        self.libraries.push(spec);
        self
    }
}
