//! On-disk layout for the module system.
//!
//! All module state lives under a single configured root:
//!
//! ```text
//! root/
//! ├── state.json                          # ledger
//! ├── installed/<id>/<version>/manifest.json
//! ├── installed/<id>/<version>/lib/       # module code artifacts
//! ├── packages/  staging/  trash/         # install-pipeline areas
//! └── active/
//! ```

use std::path::{Path, PathBuf};

use super::version::SemVer;

/// File name of the persisted ledger within the root.
pub const STATE_FILE: &str = "state.json";

/// File name of a module version's manifest within its directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Subdirectory of a module version holding its code artifacts.
pub const LIB_DIR: &str = "lib";

/// Resolved directory convention under a modules root.
#[derive(Debug, Clone)]
pub struct ModuleLayout {
    pub root: PathBuf,
    pub state_file: PathBuf,
    pub packages_dir: PathBuf,
    pub installed_dir: PathBuf,
    pub active_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub trash_dir: PathBuf,
}

impl ModuleLayout {
    /// Build the layout for a root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            state_file: root.join(STATE_FILE),
            packages_dir: root.join("packages"),
            installed_dir: root.join("installed"),
            active_dir: root.join("active"),
            staging_dir: root.join("staging"),
            trash_dir: root.join("trash"),
            root,
        }
    }

    /// Directory of a specific installed module version.
    pub fn module_version_dir(&self, id: &str, version: &str) -> PathBuf {
        self.installed_dir.join(id).join(version)
    }

    /// Manifest path of a specific installed module version.
    pub fn manifest_path(&self, id: &str, version: &str) -> PathBuf {
        self.module_version_dir(id, version).join(MANIFEST_FILE)
    }
}

/// Resolve the modules root directory.
///
/// Order: explicit configuration (absolute, or relative to the current
/// directory), then `/data/modules` when a `/data` volume exists (the
/// container convention), then `~/.telepanel/modules`.
pub fn resolve_modules_root(configured: Option<&str>) -> PathBuf {
    if let Some(path) = configured.map(str::trim).filter(|p| !p.is_empty()) {
        let path = Path::new(path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        return std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path);
    }

    if Path::new("/data").is_dir() {
        return PathBuf::from("/data/modules");
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".telepanel")
        .join("modules")
}

/// The version of the hosting process, used for built-in pinning and
/// host-compatibility checks. Build metadata on `CARGO_PKG_VERSION` is
/// stripped by the parser.
pub fn host_version() -> SemVer {
    SemVer::parse(env!("CARGO_PKG_VERSION")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = ModuleLayout::new("/data/modules");
        assert_eq!(layout.root, PathBuf::from("/data/modules"));
        assert_eq!(layout.state_file, PathBuf::from("/data/modules/state.json"));
        assert_eq!(layout.installed_dir, PathBuf::from("/data/modules/installed"));
        assert_eq!(layout.packages_dir, PathBuf::from("/data/modules/packages"));
        assert_eq!(layout.active_dir, PathBuf::from("/data/modules/active"));
        assert_eq!(layout.staging_dir, PathBuf::from("/data/modules/staging"));
        assert_eq!(layout.trash_dir, PathBuf::from("/data/modules/trash"));
    }

    #[test]
    fn test_module_version_paths() {
        let layout = ModuleLayout::new("/data/modules");
        assert_eq!(
            layout.module_version_dir("acme.broadcast", "2.0.0"),
            PathBuf::from("/data/modules/installed/acme.broadcast/2.0.0")
        );
        assert_eq!(
            layout.manifest_path("acme.broadcast", "2.0.0"),
            PathBuf::from("/data/modules/installed/acme.broadcast/2.0.0/manifest.json")
        );
    }

    #[test]
    fn test_resolve_modules_root_prefers_configured_absolute() {
        let root = resolve_modules_root(Some("/srv/panel/modules"));
        assert_eq!(root, PathBuf::from("/srv/panel/modules"));
    }

    #[test]
    fn test_resolve_modules_root_relative_joins_cwd() {
        let root = resolve_modules_root(Some("modules"));
        assert!(root.is_absolute());
        assert!(root.ends_with("modules"));
    }

    #[test]
    fn test_resolve_modules_root_blank_falls_through() {
        let root = resolve_modules_root(Some("   "));
        // Either the /data convention or the home fallback; never blank.
        assert!(root.to_string_lossy().contains("modules"));
    }

    #[test]
    fn test_host_version_parses_crate_version() {
        let v = host_version();
        assert_eq!(v.to_string(), env!("CARGO_PKG_VERSION"));
    }
}
