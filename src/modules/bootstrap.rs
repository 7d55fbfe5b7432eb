//! Process-startup orchestration for the module system.
//!
//! The bootstrapper runs exactly once, before the host serves its first
//! request: it reconciles built-in modules into the ledger, loads every
//! enabled module (isolated load, then the module's service-configuration
//! hook), rolls a failing module back to its last known-good version, and
//! disables modules that cannot be brought up at all. A single module's
//! failure never aborts startup of the rest of the system.
//!
//! The ledger is persisted once, after every module slot has been resolved;
//! an interrupted boot leaves the ledger exactly as it was.

use std::fs;

use tracing::{info, warn};

use crate::error::{PanelError, Result};

use super::builtin::BuiltInCatalog;
use super::host::{ModuleHostContext, ServiceCollection};
use super::layout::ModuleLayout;
use super::loader::{ModuleLoadContext, ModuleLoader};
use super::manifest::ModuleManifest;
use super::registry::{LoadedModule, ModuleRegistry};
use super::state::{ModuleState, ModuleStateStore};
use super::version::{SemVer, VersionRange};

/// One-shot startup orchestrator.
pub struct Bootstrapper {
    layout: ModuleLayout,
    store: ModuleStateStore,
    builtins: BuiltInCatalog,
    host_version: SemVer,
    context: ModuleHostContext,
    loader: Box<dyn ModuleLoader>,
}

impl Bootstrapper {
    pub fn new(layout: ModuleLayout, host_version: SemVer) -> Self {
        let context = ModuleHostContext::new(host_version.to_string(), layout.root.clone());
        Self {
            store: ModuleStateStore::new(layout.clone()),
            builtins: BuiltInCatalog::new(host_version.to_string()),
            host_version,
            context,
            loader: Box::new(ModuleLoadContext::new()),
            layout,
        }
    }

    /// Replace the dynamic loader. Used by tests and embedding hosts.
    pub fn with_loader(mut self, loader: Box<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// The context handed to every module hook.
    pub fn context(&self) -> &ModuleHostContext {
        &self.context
    }

    /// Run the full bootstrap sequence and return the registry of modules
    /// that completed load + configure.
    ///
    /// # Errors
    /// Only an unreadable or unwritable modules root is fatal; every
    /// per-module failure is handled by disabling or rolling back that
    /// module alone.
    pub fn run(&self, services: &mut ServiceCollection) -> Result<ModuleRegistry> {
        let mut state = self.store.load()?;
        self.reconcile_builtins(&mut state);

        let mut registry = ModuleRegistry::new();

        // 1) Built-in modules.
        for instance in self.builtins.create_modules() {
            let manifest = instance.manifest().clone();
            let id = manifest.id.clone();
            let enabled = state.find(&id).map(|i| i.enabled).unwrap_or(true);
            if !enabled {
                info!(module = %id, "Built-in module disabled, skipping");
                continue;
            }

            match instance.configure_services(services, &self.context) {
                Ok(()) => {
                    registry.add(LoadedModule {
                        id: id.clone(),
                        version: self.host_version.to_string(),
                        built_in: true,
                        instance,
                        context: self.context.clone(),
                        manifest,
                        root_path: None,
                    });
                }
                Err(e) => {
                    // Built-ins have no alternate version to roll back to.
                    warn!(module = %id, error = %e, "Built-in module configure failed, disabling");
                    if let Some(item) = state.find_mut(&id) {
                        item.enabled = false;
                    }
                }
            }
        }

        // 2) Externally installed modules.
        let external: Vec<usize> = (0..state.modules.len())
            .filter(|&i| {
                let item = &state.modules[i];
                !item.built_in
                    && item.enabled
                    && item
                        .active_version
                        .as_deref()
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .is_some()
            })
            .collect();

        for idx in external {
            let id = state.modules[idx].id.clone();
            let version = state.modules[idx]
                .active_version
                .clone()
                .unwrap_or_default()
                .trim()
                .to_string();

            let manifest = match self.read_manifest(&id, &version) {
                Ok(m) => m,
                Err(e) => {
                    warn!(module = %id, version = %version, error = %e, "Module manifest unusable, disabling");
                    state.modules[idx].enabled = false;
                    continue;
                }
            };

            // Wrong host: never attempt the entry point, no rollback either,
            // since every on-disk version was pinned for this active slot.
            if !manifest.host_compatible(self.host_version) {
                warn!(
                    module = %id,
                    version = %version,
                    host = %self.host_version,
                    "Module is not compatible with this host version, disabling"
                );
                state.modules[idx].enabled = false;
                continue;
            }

            let attempt = self
                .check_dependencies(&manifest, &state)
                .and_then(|()| self.activate(&id, &version, manifest, services, &mut registry));

            match attempt {
                Ok(()) => {
                    state.modules[idx].last_good_version = Some(version);
                }
                Err(e) => {
                    warn!(module = %id, version = %version, error = %e, "Module load failed");

                    let fallback = state.modules[idx]
                        .last_good_version
                        .as_deref()
                        .map(str::trim)
                        .filter(|v| !v.is_empty() && *v != version)
                        .map(str::to_string);

                    match fallback {
                        Some(fallback) => {
                            warn!(module = %id, version = %fallback, "Rolling module back to last good version");
                            state.modules[idx].active_version = Some(fallback.clone());

                            let retried = self
                                .read_manifest(&id, &fallback)
                                .and_then(|m| {
                                    if m.host_compatible(self.host_version) {
                                        Ok(m)
                                    } else {
                                        Err(PanelError::Manifest(format!(
                                            "Fallback version {} is not host compatible",
                                            fallback
                                        )))
                                    }
                                })
                                .and_then(|m| {
                                    self.check_dependencies(&m, &state)?;
                                    self.activate(&id, &fallback, m, services, &mut registry)
                                });

                            if let Err(e2) = retried {
                                warn!(module = %id, version = %fallback, error = %e2, "Module rollback load failed, disabling");
                                state.modules[idx].enabled = false;
                            }
                        }
                        None => {
                            state.modules[idx].enabled = false;
                        }
                    }
                }
            }
        }

        // Persist once, after every slot is resolved.
        self.store.save(&mut state)?;

        info!(
            loaded = registry.len(),
            host = %self.host_version,
            "Module bootstrap complete"
        );

        Ok(registry)
    }

    /// Guarantee a ledger entry for every built-in module, pinned to the
    /// current host version. A fresh entry is enabled by default; an
    /// operator's explicit disable is preserved across reboots.
    fn reconcile_builtins(&self, state: &mut ModuleState) {
        let host = self.host_version.to_string();

        for manifest in self.builtins.manifests() {
            match state.find_mut(&manifest.id) {
                None => {
                    state.modules.push(super::state::ModuleStateItem {
                        id: manifest.id.clone(),
                        enabled: true,
                        active_version: Some(host.clone()),
                        last_good_version: Some(host.clone()),
                        installed_versions: vec![host.clone()],
                        built_in: true,
                    });
                }
                Some(item) => {
                    item.built_in = true;
                    item.active_version = Some(host.clone());
                    item.last_good_version = Some(host.clone());
                    if !item.installed_versions.iter().any(|v| v == &host) {
                        item.installed_versions.push(host.clone());
                    }
                }
            }
        }
    }

    /// Read, parse, normalize, and validate an installed version's manifest.
    fn read_manifest(&self, id: &str, version: &str) -> Result<ModuleManifest> {
        let path = self.layout.manifest_path(id, version);
        if !path.is_file() {
            return Err(PanelError::Manifest(format!(
                "Manifest missing: {}",
                path.display()
            )));
        }

        let json = fs::read_to_string(&path)?;
        let mut manifest: ModuleManifest = serde_json::from_str(&json)
            .map_err(|e| PanelError::Manifest(format!("Failed to parse {}: {}", path.display(), e)))?;

        manifest.normalize();
        manifest.validate()?;

        if manifest.id != id {
            return Err(PanelError::Manifest(format!(
                "Manifest id '{}' does not match installed slot '{}'",
                manifest.id, id
            )));
        }

        Ok(manifest)
    }

    /// Check every declared dependency against the ledger: the dependency
    /// must be present, enabled, and its active version inside the declared
    /// range. Checked, never transitively resolved.
    fn check_dependencies(&self, manifest: &ModuleManifest, state: &ModuleState) -> Result<()> {
        for dep in &manifest.dependencies {
            let item = state.find(&dep.id).ok_or_else(|| {
                PanelError::Manifest(format!(
                    "Module '{}' depends on '{}', which is not installed",
                    manifest.id, dep.id
                ))
            })?;

            if !item.enabled {
                return Err(PanelError::Manifest(format!(
                    "Module '{}' depends on '{}', which is disabled",
                    manifest.id, dep.id
                )));
            }

            let active = item
                .active_version
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    PanelError::Manifest(format!(
                        "Module '{}' depends on '{}', which has no active version",
                        manifest.id, dep.id
                    ))
                })?;

            let active = SemVer::parse(active)?;
            let range = VersionRange::parse(&dep.range)?;
            if !range.contains(active) {
                return Err(PanelError::Manifest(format!(
                    "Module '{}' requires '{}' in range '{}', but {} is active",
                    manifest.id, dep.id, dep.range, active
                )));
            }
        }
        Ok(())
    }

    /// Isolated load + configure hook + registry entry. A configure failure
    /// is treated identically to a load failure by the caller.
    fn activate(
        &self,
        id: &str,
        version: &str,
        manifest: ModuleManifest,
        services: &mut ServiceCollection,
        registry: &mut ModuleRegistry,
    ) -> Result<()> {
        let module_root = self.layout.module_version_dir(id, version);
        let instance = self.loader.load(&module_root, &manifest)?;

        instance
            .configure_services(services, &self.context)
            .map_err(|e| PanelError::ModuleConfigure(format!("{}: {}", id, e)))?;

        info!(module = %id, version = %version, "Module loaded");

        registry.add(LoadedModule {
            id: id.to_string(),
            version: version.to_string(),
            built_in: false,
            instance,
            context: self.context.clone(),
            manifest,
            root_path: Some(module_root),
        });

        Ok(())
    }
}
