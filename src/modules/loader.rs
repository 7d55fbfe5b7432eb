//! Isolated loading of externally installed module code.
//!
//! Each module version's code lives under its own `lib/` directory. Before
//! the entry library is opened, the loader brings the module's private
//! dependency closure in from that directory: artifacts named by the
//! module's own `deps.json` first, a by-name scan of the directory when no
//! dependency manifest exists, and only unresolved names fall through to
//! the host's shared facilities (the process linker). Two modules therefore
//! never silently collide on incompatible versions of a shared dependency.
//!
//! There is no unload: every opened library is deliberately leaked and
//! persists for the remainder of the process.

use std::fs;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PanelError, Result};

use super::host::PanelModule;
use super::layout::LIB_DIR;
use super::manifest::ModuleManifest;

/// File name of a module's optional private dependency manifest.
pub const DEPS_FILE: &str = "deps.json";

/// Exported constructor signature every module entry library provides.
pub type ModuleConstructor = unsafe extern "C" fn() -> *mut dyn PanelModule;

/// Seam between the bootstrapper and the dynamic-loading machinery.
pub trait ModuleLoader {
    /// Activate the module code described by a normalized, validated
    /// manifest rooted at `module_root`.
    fn load(&self, module_root: &Path, manifest: &ModuleManifest) -> Result<Box<dyn PanelModule>>;
}

/// A module's private dependency manifest: artifact file names to resolve
/// from the module's own directory before anything shared.
#[derive(Debug, Default, Deserialize)]
struct DepsManifest {
    #[serde(default)]
    artifacts: Vec<String>,
}

/// Production loader: one isolation boundary per module directory.
#[derive(Debug, Default)]
pub struct ModuleLoadContext;

impl ModuleLoadContext {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for ModuleLoadContext {
    fn load(&self, module_root: &Path, manifest: &ModuleManifest) -> Result<Box<dyn PanelModule>> {
        let lib_dir = module_root.join(LIB_DIR);
        let entry_file = sanitized_artifact_name(&manifest.entry.assembly)?;
        let entry_path = lib_dir.join(&entry_file);

        if !entry_path.is_file() {
            return Err(PanelError::EntryPoint(format!(
                "Entry artifact does not exist: {}",
                entry_path.display()
            )));
        }

        // Resolve the module-local dependency closure before the entry
        // library so same-named shared dependencies bind to this module's
        // copies, not another module's.
        let mut libraries = Vec::new();
        for path in collect_preload_artifacts(&lib_dir, &entry_file)? {
            debug!(artifact = %path.display(), "Preloading module dependency");
            match unsafe { Library::new(&path) } {
                Ok(lib) => libraries.push(lib),
                Err(e) => {
                    // Unresolved here falls through to the host's shared pool.
                    warn!(
                        artifact = %path.display(),
                        error = %e,
                        "Module dependency failed to preload, deferring to shared resolution"
                    );
                }
            }
        }

        let entry = unsafe { Library::new(&entry_path) }?;
        let instance = unsafe {
            let constructor: Symbol<ModuleConstructor> =
                entry.get(manifest.entry.symbol.as_bytes()).map_err(|e| {
                    PanelError::EntryPoint(format!(
                        "Entry symbol '{}' not found in {}: {}",
                        manifest.entry.symbol,
                        entry_path.display(),
                        e
                    ))
                })?;
            Box::from_raw(constructor())
        };

        // No unload: the boundary persists for the process lifetime.
        for lib in libraries {
            std::mem::forget(lib);
        }
        std::mem::forget(entry);

        Ok(instance)
    }
}

/// Dependency artifacts to open before the entry library, in resolution
/// order: `deps.json` entries first (missing ones fall back to a by-name
/// directory search), else every shared library in the directory other
/// than the entry itself.
fn collect_preload_artifacts(lib_dir: &Path, entry_file: &str) -> Result<Vec<PathBuf>> {
    let deps_path = lib_dir.join(DEPS_FILE);

    if deps_path.is_file() {
        let json = fs::read_to_string(&deps_path)?;
        let deps: DepsManifest = serde_json::from_str(&json).map_err(|e| {
            PanelError::Manifest(format!(
                "Invalid dependency manifest {}: {}",
                deps_path.display(),
                e
            ))
        })?;

        let mut artifacts = Vec::new();
        for name in deps.artifacts {
            let name = sanitized_artifact_name(&name)?;
            if name == entry_file {
                continue;
            }
            let listed = lib_dir.join(&name);
            if listed.is_file() {
                artifacts.push(listed);
            } else if let Some(found) = find_by_name(lib_dir, &name)? {
                artifacts.push(found);
            }
            // else: left to the host's shared facilities
        }
        return Ok(artifacts);
    }

    // No dependency manifest: by-name search is the whole directory scan.
    let mut artifacts = Vec::new();
    if lib_dir.is_dir() {
        let mut entries: Vec<PathBuf> = fs::read_dir(lib_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_shared_library(p))
            .collect();
        entries.sort();
        for path in entries {
            if path.file_name().map(|n| n.to_string_lossy() == entry_file) != Some(true) {
                artifacts.push(path);
            }
        }
    }
    Ok(artifacts)
}

/// Search the module's own directory for an artifact by file name.
fn find_by_name(lib_dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    if !lib_dir.is_dir() {
        return Ok(None);
    }
    for entry in fs::read_dir(lib_dir)? {
        let path = entry?.path();
        if path.is_file() && path.file_name().map(|n| n.to_string_lossy() == name) == Some(true) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn is_shared_library(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("so") | Some("dylib") | Some("dll")
    )
}

/// Artifact names must be bare file names; path components would escape
/// the module's isolation boundary.
fn sanitized_artifact_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PanelError::EntryPoint("empty artifact name".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(PanelError::EntryPoint(format!(
            "Artifact name '{}' must not contain path components",
            name
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::manifest::ModuleEntryPoint;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn manifest_with_entry(assembly: &str, symbol: &str) -> ModuleManifest {
        ModuleManifest {
            id: "acme.demo".to_string(),
            version: "1.0.0".to_string(),
            entry: ModuleEntryPoint {
                assembly: assembly.to_string(),
                symbol: symbol.to_string(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_entry_artifact_is_entry_point_error() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("lib")).unwrap();

        let loader = ModuleLoadContext::new();
        let manifest = manifest_with_entry("libmissing.so", "panel_module_create");
        let err = loader.load(tmp.path(), &manifest).unwrap_err();

        assert!(matches!(err, PanelError::EntryPoint(_)));
        assert!(err.to_string().contains("libmissing.so"));
    }

    #[test]
    fn test_artifact_names_with_path_components_rejected() {
        let tmp = TempDir::new().unwrap();
        let loader = ModuleLoadContext::new();

        for bad in ["../escape.so", "sub/dir.so", "a\\b.dll"] {
            let manifest = manifest_with_entry(bad, "panel_module_create");
            let err = loader.load(tmp.path(), &manifest).unwrap_err();
            assert!(matches!(err, PanelError::EntryPoint(_)), "{}", bad);
        }
    }

    #[test]
    fn test_preload_from_deps_manifest_in_listed_order() {
        let tmp = TempDir::new().unwrap();
        let lib = tmp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        touch(&lib, "libdep_b.so");
        touch(&lib, "libdep_a.so");
        touch(&lib, "libentry.so");
        fs::write(
            lib.join(DEPS_FILE),
            r#"{"artifacts": ["libdep_b.so", "libdep_a.so"]}"#,
        )
        .unwrap();

        let artifacts = collect_preload_artifacts(&lib, "libentry.so").unwrap();
        assert_eq!(
            artifacts,
            vec![lib.join("libdep_b.so"), lib.join("libdep_a.so")]
        );
    }

    #[test]
    fn test_deps_manifest_skips_entry_and_missing_artifacts() {
        let tmp = TempDir::new().unwrap();
        let lib = tmp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        touch(&lib, "libdep.so");
        touch(&lib, "libentry.so");
        fs::write(
            lib.join(DEPS_FILE),
            // The entry itself and an absent artifact are not preloaded;
            // the absent one defers to shared resolution.
            r#"{"artifacts": ["libentry.so", "libdep.so", "libabsent.so"]}"#,
        )
        .unwrap();

        let artifacts = collect_preload_artifacts(&lib, "libentry.so").unwrap();
        assert_eq!(artifacts, vec![lib.join("libdep.so")]);
    }

    #[test]
    fn test_invalid_deps_manifest_is_manifest_error() {
        let tmp = TempDir::new().unwrap();
        let lib = tmp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join(DEPS_FILE), "{ broken").unwrap();

        let err = collect_preload_artifacts(&lib, "libentry.so").unwrap_err();
        assert!(matches!(err, PanelError::Manifest(_)));
    }

    #[test]
    fn test_by_name_scan_without_deps_manifest() {
        let tmp = TempDir::new().unwrap();
        let lib = tmp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        touch(&lib, "libdep_a.so");
        touch(&lib, "libdep_b.so");
        touch(&lib, "libentry.so");
        touch(&lib, "README.md");

        let artifacts = collect_preload_artifacts(&lib, "libentry.so").unwrap();
        // Shared libraries only, entry excluded, deterministic order.
        assert_eq!(
            artifacts,
            vec![lib.join("libdep_a.so"), lib.join("libdep_b.so")]
        );
    }

    #[test]
    fn test_empty_lib_dir_preloads_nothing() {
        let tmp = TempDir::new().unwrap();
        let lib = tmp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();

        let artifacts = collect_preload_artifacts(&lib, "libentry.so").unwrap();
        assert!(artifacts.is_empty());
    }
}
