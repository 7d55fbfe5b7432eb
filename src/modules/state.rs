//! Persisted module ledger.
//!
//! `state.json` records which modules exist, which version is active, which
//! version last loaded successfully, and enabled/disabled flags. Writes go
//! through a sibling temp file plus atomic replace so a crash mid-write can
//! never leave a truncated ledger behind.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PanelError, Result};

use super::layout::ModuleLayout;

/// Current ledger schema version, stamped on every save.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// The whole persisted ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleState {
    #[serde(default)]
    pub schema_version: u32,

    #[serde(default)]
    pub modules: Vec<ModuleStateItem>,
}

/// Ledger entry for one module id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStateItem {
    pub id: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub active_version: Option<String>,

    #[serde(default)]
    pub last_good_version: Option<String>,

    /// Append-only: never loses a version that is still on disk.
    #[serde(default)]
    pub installed_versions: Vec<String>,

    #[serde(default)]
    pub built_in: bool,
}

impl ModuleState {
    pub fn find(&self, id: &str) -> Option<&ModuleStateItem> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut ModuleStateItem> {
        self.modules.iter_mut().find(|m| m.id == id)
    }
}

/// Loads and saves the ledger under a module layout.
pub struct ModuleStateStore {
    layout: ModuleLayout,
}

impl ModuleStateStore {
    pub fn new(layout: ModuleLayout) -> Self {
        Self { layout }
    }

    /// Read the ledger, creating the directory layout first.
    ///
    /// An absent or blank state file yields a fresh empty ledger; that is
    /// the first-boot case, not an error.
    pub fn load(&self) -> Result<ModuleState> {
        self.ensure_directories()?;

        if !self.layout.state_file.exists() {
            return Ok(ModuleState::default());
        }

        let json = fs::read_to_string(&self.layout.state_file)?;
        if json.trim().is_empty() {
            return Ok(ModuleState::default());
        }

        let state: ModuleState = serde_json::from_str(&json)?;
        Ok(state)
    }

    /// Persist the ledger with the current schema version stamped.
    ///
    /// Serializes to `state.json.tmp` next to the target and then atomically
    /// replaces it, so the next read observes either the previous valid
    /// ledger or the new one, never a corrupt hybrid.
    pub fn save(&self, state: &mut ModuleState) -> Result<()> {
        self.ensure_directories()?;

        state.schema_version = STATE_SCHEMA_VERSION;

        let json = serde_json::to_string_pretty(state)?;
        let target = &self.layout.state_file;
        let temp = temp_path(target);

        fs::write(&temp, json)?;
        replace_file(&temp, target)?;

        debug!(path = %target.display(), modules = state.modules.len(), "Saved module state");
        Ok(())
    }

    /// Create the full directory layout idempotently.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.layout.root,
            &self.layout.packages_dir,
            &self.layout.installed_dir,
            &self.layout.active_dir,
            &self.layout.staging_dir,
            &self.layout.trash_dir,
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                PanelError::State(format!(
                    "Failed to create module directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

fn temp_path(target: &Path) -> std::path::PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Atomic replace-if-exists, move-if-not.
fn replace_file(temp: &Path, target: &Path) -> Result<()> {
    // rename replaces atomically on Unix; Windows needs the target cleared.
    #[cfg(windows)]
    if target.exists() {
        fs::remove_file(target)?;
    }
    fs::rename(temp, target)?;
    Ok(())
}
