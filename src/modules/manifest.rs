//! Module manifest model, normalization, and validation.
//!
//! Each externally installed module version ships a `manifest.json` that
//! declares the module's identity, host-compatibility bounds, dependency
//! ranges, and the entry point locating its code.
//!
//! # Example manifest.json
//!
//! ```json
//! {
//!   "id": "acme.broadcast",
//!   "name": "Broadcast tasks",
//!   "version": "2.0.0",
//!   "host": { "min": "1.0.0" },
//!   "dependencies": [
//!     { "id": "acme.common", "range": ">=1.2.0 <2.0.0" }
//!   ],
//!   "entry": { "assembly": "libacme_broadcast.so", "type": "panel_module_create" }
//! }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};

use super::version::{SemVer, VersionRange};

/// Module ids: 1-64 chars, alphanumeric plus dots and hyphens, starting
/// alphanumeric (e.g. `builtin.kick-api`).
static MODULE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.\-]{0,63}$").expect("valid module id regex"));

/// The manifest loaded from a module's `manifest.json` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Stable module identity, unique across the installed set.
    #[serde(default)]
    pub id: String,

    /// Human-readable display name.
    #[serde(default)]
    pub name: String,

    /// Module version string (e.g. "1.0.0").
    #[serde(default)]
    pub version: String,

    /// Optional bounds on the compatible host version.
    #[serde(default)]
    pub host: HostCompatibility,

    /// Declared dependencies on other installed modules.
    #[serde(default)]
    pub dependencies: Vec<ModuleDependency>,

    /// Entry point locating the module's code artifact and constructor symbol.
    #[serde(default)]
    pub entry: ModuleEntryPoint,
}

/// Optional min/max host version bounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostCompatibility {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

/// A single declared dependency on another module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleDependency {
    #[serde(default)]
    pub id: String,

    /// Version range expression, e.g. `"1.2.3"` or `">=1.2.3 <2.0.0"`.
    #[serde(default)]
    pub range: String,
}

/// Locates the module's code: a library file name under `lib/` and the
/// exported constructor symbol within it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleEntryPoint {
    #[serde(default)]
    pub assembly: String,

    #[serde(default, rename = "type")]
    pub symbol: String,
}

impl ModuleManifest {
    /// Trim all string fields in place so downstream code never re-trims.
    pub fn normalize(&mut self) {
        self.id = self.id.trim().to_string();
        self.name = self.name.trim().to_string();
        self.version = self.version.trim().to_string();
        self.entry.assembly = self.entry.assembly.trim().to_string();
        self.entry.symbol = self.entry.symbol.trim().to_string();
        self.host.min = normalize_optional(self.host.min.take());
        self.host.max = normalize_optional(self.host.max.take());
        for dep in &mut self.dependencies {
            dep.id = dep.id.trim().to_string();
            dep.range = dep.range.trim().to_string();
        }
    }

    /// Validate a normalized manifest.
    ///
    /// Checks the id shape, the version string, non-empty entry fields,
    /// host bounds, and that every declared dependency range compiles.
    /// A failure here is fatal for this module only.
    pub fn validate(&self) -> Result<()> {
        if !MODULE_ID_RE.is_match(&self.id) {
            return Err(PanelError::Manifest(format!(
                "Invalid module id '{}': must be 1-64 alphanumeric characters, dots and hyphens, starting with alphanumeric",
                self.id
            )));
        }

        SemVer::parse(&self.version).map_err(|e| {
            PanelError::Manifest(format!("Module '{}' has an invalid version: {}", self.id, e))
        })?;

        if self.entry.assembly.is_empty() {
            return Err(PanelError::Manifest(format!(
                "Module '{}' has an empty entry.assembly",
                self.id
            )));
        }
        if self.entry.symbol.is_empty() {
            return Err(PanelError::Manifest(format!(
                "Module '{}' has an empty entry.type",
                self.id
            )));
        }

        if let Some(min) = &self.host.min {
            SemVer::parse(min).map_err(|e| {
                PanelError::Manifest(format!("Module '{}' has an invalid host.min: {}", self.id, e))
            })?;
        }
        if let Some(max) = &self.host.max {
            SemVer::parse(max).map_err(|e| {
                PanelError::Manifest(format!("Module '{}' has an invalid host.max: {}", self.id, e))
            })?;
        }

        for dep in &self.dependencies {
            if dep.id.is_empty() {
                return Err(PanelError::Manifest(format!(
                    "Module '{}' declares a dependency with an empty id",
                    self.id
                )));
            }
            VersionRange::parse(&dep.range).map_err(|e| {
                PanelError::Manifest(format!(
                    "Module '{}' dependency '{}' has an invalid range: {}",
                    self.id, dep.id, e
                ))
            })?;
        }

        Ok(())
    }

    /// Whether the given host version falls within the declared bounds.
    ///
    /// Absent bounds are unconstrained. Call after `validate()`; malformed
    /// bounds are treated as incompatible here rather than panicking.
    pub fn host_compatible(&self, host: SemVer) -> bool {
        if let Some(min) = &self.host.min {
            match SemVer::parse(min) {
                Ok(min) if host >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = &self.host.max {
            match SemVer::parse(max) {
                Ok(max) if host <= max => {}
                _ => return false,
            }
        }
        true
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    match value {
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        None => None,
    }
}
