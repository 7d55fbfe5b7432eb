//! Host configuration.
//!
//! Loaded from `~/.telepanel/config.json` when present; every field has a
//! default so a missing file is a valid zero-config install. The
//! `TELEPANEL_MODULES_ROOT` environment variable overrides the configured
//! modules root.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment override for the modules root directory.
pub const MODULES_ROOT_ENV: &str = "TELEPANEL_MODULES_ROOT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelConfig {
    /// Modules root directory. Absent means the platform default
    /// (`/data/modules` in containers, `~/.telepanel/modules` otherwise).
    pub modules_root: Option<String>,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl PanelConfig {
    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".telepanel")
            .join("config.json")
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist. A present-but-invalid file is an error.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    /// The configured modules root, with the environment override applied.
    pub fn modules_root(&self) -> Option<String> {
        std::env::var(MODULES_ROOT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.modules_root.clone())
    }
}
