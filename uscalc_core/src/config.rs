//! Configuration file support for uscalc.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/uscalc/config.toml`.

use crate::cache::{CacheName, Manifest};
use crate::{Defaults, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub clipboard: ClipboardConfig,
}

/// Offline asset cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Where cache generations live on disk
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Bump whenever `assets` changes so stale generations get deleted
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    /// Directory the page is served from (the "network")
    #[serde(default = "default_origin_dir")]
    pub origin_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            prefix: default_prefix(),
            version: default_version(),
            assets: default_assets(),
            origin_dir: default_origin_dir(),
        }
    }
}

impl CacheConfig {
    pub fn cache_name(&self) -> CacheName {
        CacheName::new(self.prefix.clone(), self.version.clone())
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::new(self.assets.clone())
    }
}

/// Clipboard configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ClipboardConfig {
    /// Program and arguments that read the text on stdin; auto-detected if unset
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

// Default value functions
fn default_cache_dir() -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    base.join("uscalc")
}

fn default_prefix() -> String {
    crate::cache::DEFAULT_PREFIX.into()
}

fn default_version() -> String {
    crate::cache::DEFAULT_VERSION.into()
}

fn default_assets() -> Vec<String> {
    crate::cache::DEFAULT_MANIFEST.paths().to_vec()
}

fn default_origin_dir() -> PathBuf {
    PathBuf::from("web")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.check()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(std::env::temp_dir);
        base.join("uscalc").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn check(&self) -> Result<()> {
        let d = &self.defaults;
        if !(d.insertion_loss_db.is_finite() && d.insertion_loss_db >= 0.0) {
            return Err(Error::Config(format!(
                "defaults.insertion_loss_db must be a non-negative number, got {}",
                d.insertion_loss_db
            )));
        }
        if !(d.skull_thickness_mm.is_finite() && d.skull_thickness_mm >= 0.0) {
            return Err(Error::Config(format!(
                "defaults.skull_thickness_mm must be a non-negative number, got {}",
                d.skull_thickness_mm
            )));
        }
        if self.cache.version.trim().is_empty() {
            return Err(Error::Config("cache.version must not be empty".into()));
        }
        if self.cache.assets.is_empty() {
            return Err(Error::Config("cache.assets must list at least one asset".into()));
        }
        Ok(())
    }
}
