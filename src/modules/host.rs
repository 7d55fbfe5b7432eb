//! The contract between the host and its modules.
//!
//! A module implements [`PanelModule`]: a manifest, a service-configuration
//! hook invoked once at load time, a route-registration hook invoked once
//! after all modules load, and zero or more optional capability providers
//! probed by the contribution registry. The capability surface is a fixed
//! set of narrow traits, never reflection over an open type hierarchy.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::Result;

use super::contributions::{ApiTypeProvider, TaskProvider, UiProvider};
use super::manifest::ModuleManifest;

/// Host-side values handed to every module hook.
#[derive(Debug, Clone)]
pub struct ModuleHostContext {
    pub host_version: String,
    pub modules_root_path: PathBuf,
}

impl ModuleHostContext {
    pub fn new(host_version: impl Into<String>, modules_root_path: impl Into<PathBuf>) -> Self {
        Self {
            host_version: host_version.into(),
            modules_root_path: modules_root_path.into(),
        }
    }
}

/// A typed service container modules register services into at configure
/// time. One value per concrete type; later inserts replace earlier ones.
#[derive(Default)]
pub struct ServiceCollection {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service instance by its concrete type.
    pub fn insert<T: Any + Send + Sync>(&mut self, service: T) {
        self.entries.insert(TypeId::of::<T>(), Box::new(service));
    }

    /// Fetch a previously registered service.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A route a module asks the serving layer to expose. The handler content
/// is module-specific and resolved by the serving layer via `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDef {
    pub method: String,
    pub path: String,
    pub name: String,
}

impl RouteDef {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            name: name.into(),
        }
    }
}

/// Where modules register their routes. Implemented by the serving layer;
/// [`RouteTable`] is the in-crate recording implementation.
pub trait RouteRegistrar {
    fn register(&mut self, route: RouteDef);
}

/// A plain ordered collection of registered routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteDef>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteRegistrar for RouteTable {
    fn register(&mut self, route: RouteDef) {
        self.routes.push(route);
    }
}

/// A pluggable panel module.
pub trait PanelModule: Send + Sync {
    /// The module's declarative manifest.
    fn manifest(&self) -> &ModuleManifest;

    /// Register the module's services. Invoked once at load time; an error
    /// here disables the module (after a rollback attempt).
    fn configure_services(
        &self,
        services: &mut ServiceCollection,
        context: &ModuleHostContext,
    ) -> Result<()>;

    /// Register the module's routes. Invoked once after all modules load;
    /// an error here is logged and never blocks other modules' routes.
    fn register_routes(
        &self,
        routes: &mut dyn RouteRegistrar,
        context: &ModuleHostContext,
    ) -> Result<()>;

    /// Optional background-task contribution provider.
    fn task_provider(&self) -> Option<&dyn TaskProvider> {
        None
    }

    /// Optional external-API-type contribution provider.
    fn api_provider(&self) -> Option<&dyn ApiTypeProvider> {
        None
    }

    /// Optional UI page/navigation contribution provider.
    fn ui_provider(&self) -> Option<&dyn UiProvider> {
        None
    }
}

impl std::fmt::Debug for dyn PanelModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelModule")
            .field("id", &self.manifest().id)
            .finish_non_exhaustive()
    }
}
