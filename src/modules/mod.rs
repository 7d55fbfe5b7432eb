//! Versioned module system.
//!
//! Modules are discovered from a persisted ledger, loaded in isolation from
//! their installed version directories, and activated through a pair of
//! hooks. Activation failures roll back to the last known-good version;
//! exhausted modules are disabled rather than retried forever. After load,
//! module contributions (tasks, external API types, UI pages) are aggregated
//! into first-wins indices with conflict diagnostics.

pub mod bootstrap;
pub mod builtin;
pub mod contributions;
pub mod host;
pub mod layout;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod state;
pub mod version;

pub use bootstrap::Bootstrapper;
pub use contributions::{ContributionConflict, ContributionRegistry};
pub use host::{ModuleHostContext, PanelModule, RouteDef, RouteRegistrar, RouteTable, ServiceCollection};
pub use layout::{host_version, resolve_modules_root, ModuleLayout};
pub use manifest::ModuleManifest;
pub use registry::{LoadedModule, ModuleRegistry};
pub use state::{ModuleState, ModuleStateStore};
pub use version::{SemVer, VersionRange};
