//! In-memory registry of modules that completed load and configuration.
//!
//! The registry is built once during bootstrap and treated as immutable for
//! the remainder of the process. There is no unload: a loaded module lives
//! until process exit.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use super::host::{ModuleHostContext, PanelModule, RouteRegistrar};
use super::manifest::ModuleManifest;

/// A module that successfully completed load + configure this process.
pub struct LoadedModule {
    pub id: String,
    pub version: String,
    pub built_in: bool,
    pub instance: Box<dyn PanelModule>,
    pub context: ModuleHostContext,
    pub manifest: ModuleManifest,
    pub root_path: Option<PathBuf>,
}

/// Ordered list of loaded modules.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<LoadedModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, module: LoadedModule) {
        self.modules.push(Arc::new(module));
    }

    pub fn modules(&self) -> &[Arc<LoadedModule>] {
        &self.modules
    }

    pub fn get(&self, id: &str) -> Option<&Arc<LoadedModule>> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Fan route registration out to every loaded module.
    ///
    /// One module's endpoint-registration bug must not prevent the remaining
    /// modules' endpoints from being exposed, so individual failures are
    /// logged and swallowed here.
    pub fn register_routes(&self, registrar: &mut dyn RouteRegistrar) {
        for m in &self.modules {
            if let Err(e) = m.instance.register_routes(registrar, &m.context) {
                warn!(
                    module = %m.id,
                    version = %m.version,
                    error = %e,
                    "Module route registration failed, continuing with remaining modules"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanelError;
    use crate::modules::host::{RouteDef, RouteTable, ServiceCollection};

    struct StubModule {
        manifest: ModuleManifest,
        route: Option<RouteDef>,
        fail_routes: bool,
    }

    impl StubModule {
        fn new(id: &str, route: Option<RouteDef>, fail_routes: bool) -> Self {
            let manifest = ModuleManifest {
                id: id.to_string(),
                ..Default::default()
            };
            Self {
                manifest,
                route,
                fail_routes,
            }
        }
    }

    impl PanelModule for StubModule {
        fn manifest(&self) -> &ModuleManifest {
            &self.manifest
        }

        fn configure_services(
            &self,
            _services: &mut ServiceCollection,
            _context: &ModuleHostContext,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        fn register_routes(
            &self,
            routes: &mut dyn RouteRegistrar,
            _context: &ModuleHostContext,
        ) -> crate::error::Result<()> {
            if self.fail_routes {
                return Err(PanelError::ModuleConfigure("route bug".to_string()));
            }
            if let Some(route) = &self.route {
                routes.register(route.clone());
            }
            Ok(())
        }
    }

    fn loaded(id: &str, route: Option<RouteDef>, fail_routes: bool) -> LoadedModule {
        LoadedModule {
            id: id.to_string(),
            version: "1.0.0".to_string(),
            built_in: false,
            instance: Box::new(StubModule::new(id, route, fail_routes)),
            context: ModuleHostContext::new("1.4.0", "/tmp/modules"),
            manifest: ModuleManifest {
                id: id.to_string(),
                ..Default::default()
            },
            root_path: None,
        }
    }

    #[test]
    fn test_registry_add_and_lookup() {
        let mut registry = ModuleRegistry::new();
        assert!(registry.is_empty());

        registry.add(loaded("a", None, false));
        registry.add(loaded("b", None, false));

        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.modules()[0].id, "a");
    }

    #[test]
    fn test_register_routes_fans_out_in_order() {
        let mut registry = ModuleRegistry::new();
        registry.add(loaded(
            "a",
            Some(RouteDef::new("POST", "/api/kick", "kick")),
            false,
        ));
        registry.add(loaded(
            "b",
            Some(RouteDef::new("GET", "/api/tasks", "tasks")),
            false,
        ));

        let mut table = RouteTable::new();
        registry.register_routes(&mut table);

        assert_eq!(table.len(), 2);
        assert_eq!(table.routes()[0].name, "kick");
        assert_eq!(table.routes()[1].name, "tasks");
    }

    #[test]
    fn test_register_routes_swallows_individual_failures() {
        let mut registry = ModuleRegistry::new();
        registry.add(loaded("broken", None, true));
        registry.add(loaded(
            "healthy",
            Some(RouteDef::new("GET", "/api/ok", "ok")),
            false,
        ));

        let mut table = RouteTable::new();
        registry.register_routes(&mut table);

        // The broken module does not block the healthy one.
        assert_eq!(table.len(), 1);
        assert_eq!(table.routes()[0].name, "ok");
    }
}
