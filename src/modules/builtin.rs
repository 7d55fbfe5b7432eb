//! Built-in modules shipped with the host.
//!
//! Built-ins go through the same load/configure/contribute path as external
//! modules but never touch the isolated loader: their code is compiled in,
//! their manifests carry the host version, and the ledger pins them to it
//! on every boot.

use crate::error::Result;

use super::contributions::{
    ApiTypeDefinition, ApiTypeProvider, NavItem, PageDefinition, TaskDefinition, TaskProvider,
    UiProvider,
};
use super::host::{ModuleHostContext, PanelModule, RouteDef, RouteRegistrar, ServiceCollection};
use super::manifest::{ModuleEntryPoint, ModuleManifest};

/// External API type key served by the kick endpoint.
pub const API_TYPE_KICK: &str = "kick";

/// The static catalog of built-in modules for one host version.
pub struct BuiltInCatalog {
    host_version: String,
}

impl BuiltInCatalog {
    pub fn new(host_version: impl Into<String>) -> Self {
        Self {
            host_version: host_version.into(),
        }
    }

    /// Instantiate every built-in module.
    pub fn create_modules(&self) -> Vec<Box<dyn PanelModule>> {
        vec![
            Box::new(KickApiModule::new(&self.host_version)),
            Box::new(TaskCatalogModule::new(&self.host_version)),
        ]
    }

    /// Manifests of the catalog, in registration order.
    pub fn manifests(&self) -> Vec<ModuleManifest> {
        self.create_modules()
            .iter()
            .map(|m| m.manifest().clone())
            .collect()
    }
}

fn builtin_manifest(id: &str, name: &str, version: &str, symbol: &str) -> ModuleManifest {
    ModuleManifest {
        id: id.to_string(),
        name: name.to_string(),
        version: version.to_string(),
        entry: ModuleEntryPoint {
            assembly: String::new(),
            symbol: symbol.to_string(),
        },
        ..Default::default()
    }
}

/// Exposes the kick/ban external API type and its endpoint.
pub struct KickApiModule {
    manifest: ModuleManifest,
}

impl KickApiModule {
    pub fn new(version: &str) -> Self {
        Self {
            manifest: builtin_manifest(
                "builtin.kick-api",
                "External API: kick/ban",
                version,
                "telepanel::modules::builtin::KickApiModule",
            ),
        }
    }
}

impl PanelModule for KickApiModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    fn configure_services(
        &self,
        _services: &mut ServiceCollection,
        _context: &ModuleHostContext,
    ) -> Result<()> {
        // Built-in: the kick handler resolves host services at request time.
        Ok(())
    }

    fn register_routes(
        &self,
        routes: &mut dyn RouteRegistrar,
        _context: &ModuleHostContext,
    ) -> Result<()> {
        routes.register(RouteDef::new("POST", "/api/kick", "external-api.kick"));
        Ok(())
    }

    fn api_provider(&self) -> Option<&dyn ApiTypeProvider> {
        Some(self)
    }
}

impl ApiTypeProvider for KickApiModule {
    fn api_types(&self, _context: &ModuleHostContext) -> Vec<ApiTypeDefinition> {
        vec![ApiTypeDefinition {
            api_type: API_TYPE_KICK.to_string(),
            display_name: "Kick/ban".to_string(),
            route: "/api/kick".to_string(),
            description: Some(
                "Kick or ban a user from bot-managed channels and groups, \
                 matched against configuration by X-API-Key."
                    .to_string(),
            ),
            order: 10,
        }]
    }
}

/// Contributes the task center surface: the broadcast task type plus its
/// page and navigation entry.
pub struct TaskCatalogModule {
    manifest: ModuleManifest,
}

impl TaskCatalogModule {
    pub fn new(version: &str) -> Self {
        Self {
            manifest: builtin_manifest(
                "builtin.task-catalog",
                "Task catalog",
                version,
                "telepanel::modules::builtin::TaskCatalogModule",
            ),
        }
    }
}

impl PanelModule for TaskCatalogModule {
    fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    fn configure_services(
        &self,
        _services: &mut ServiceCollection,
        _context: &ModuleHostContext,
    ) -> Result<()> {
        Ok(())
    }

    fn register_routes(
        &self,
        routes: &mut dyn RouteRegistrar,
        _context: &ModuleHostContext,
    ) -> Result<()> {
        routes.register(RouteDef::new("GET", "/api/tasks/types", "task-catalog.types"));
        Ok(())
    }

    fn task_provider(&self) -> Option<&dyn TaskProvider> {
        Some(self)
    }

    fn ui_provider(&self) -> Option<&dyn UiProvider> {
        Some(self)
    }
}

impl TaskProvider for TaskCatalogModule {
    fn tasks(&self, _context: &ModuleHostContext) -> Vec<TaskDefinition> {
        vec![TaskDefinition {
            category: "user".to_string(),
            task_type: "broadcast".to_string(),
            display_name: "Broadcast message".to_string(),
            description: Some("Send a message from selected accounts to a target list.".to_string()),
            icon: "send".to_string(),
            create_route: Some("/tasks/new/broadcast".to_string()),
            editor_component: None,
            order: 10,
        }]
    }
}

impl UiProvider for TaskCatalogModule {
    fn pages(&self, _context: &ModuleHostContext) -> Vec<PageDefinition> {
        vec![PageDefinition {
            key: "task-center".to_string(),
            title: "Task Center".to_string(),
            icon: "list-checks".to_string(),
            component_type: "telepanel.pages.task-center".to_string(),
            group: Some("Tasks".to_string()),
            order: 10,
        }]
    }

    fn nav_items(&self, _context: &ModuleHostContext) -> Vec<NavItem> {
        vec![NavItem {
            title: "Task Center".to_string(),
            href: "/tasks".to_string(),
            icon: "list-checks".to_string(),
            group: Some("Tasks".to_string()),
            order: 10,
        }]
    }
}
