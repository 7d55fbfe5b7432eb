//! Module capability contributions and their aggregated registry.
//!
//! After all modules are loaded, each one is probed for the optional
//! capability providers it offers (background-task types, external API
//! types, UI pages, navigation items). Contributions are normalized and
//! indexed once; on a key collision the first-registered definition wins
//! and the collision is kept as an operator-inspectable diagnostic, never
//! raised as an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::host::ModuleHostContext;
use super::registry::{LoadedModule, ModuleRegistry};

/// Provider of background-task type contributions.
pub trait TaskProvider {
    fn tasks(&self, context: &ModuleHostContext) -> Vec<TaskDefinition>;
}

/// Provider of externally callable API type contributions.
pub trait ApiTypeProvider {
    fn api_types(&self, context: &ModuleHostContext) -> Vec<ApiTypeDefinition>;
}

/// Provider of UI surface contributions (pages and navigation items).
pub trait UiProvider {
    fn pages(&self, context: &ModuleHostContext) -> Vec<PageDefinition>;
    fn nav_items(&self, context: &ModuleHostContext) -> Vec<NavItem>;
}

/// A background-task type a module offers to the task center.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    /// Task category, e.g. `user` / `bot` / `system`.
    #[serde(default)]
    pub category: String,

    /// Stable task type key, matched against persisted batch tasks.
    #[serde(default)]
    pub task_type: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub icon: String,

    /// Optional page route the task center links to for creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_route: Option<String>,

    /// Optional opaque component type identifier for the task editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_component: Option<String>,

    #[serde(default)]
    pub order: i32,
}

/// An externally callable API type a module exposes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTypeDefinition {
    /// Stable API type key, matched against configured API entries.
    #[serde(default, rename = "type")]
    pub api_type: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub route: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub order: i32,
}

/// A UI page a module contributes; `component_type` is an opaque identifier
/// resolved by the rendering layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDefinition {
    /// Page key, unique within the contributing module.
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub icon: String,

    #[serde(default)]
    pub component_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default)]
    pub order: i32,
}

/// A navigation entry a module contributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavItem {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub href: String,

    #[serde(default)]
    pub icon: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default)]
    pub order: i32,
}

/// A task contribution paired with the module that registered it.
#[derive(Clone)]
pub struct RegisteredTask {
    pub module: Arc<LoadedModule>,
    pub definition: TaskDefinition,
}

/// An API type contribution paired with the module that registered it.
#[derive(Clone)]
pub struct RegisteredApiType {
    pub module: Arc<LoadedModule>,
    pub definition: ApiTypeDefinition,
}

/// A page contribution paired with the module that registered it.
#[derive(Clone)]
pub struct RegisteredPage {
    pub module: Arc<LoadedModule>,
    pub definition: PageDefinition,
}

/// A navigation contribution paired with the module that registered it.
#[derive(Clone)]
pub struct RegisteredNavItem {
    pub module: Arc<LoadedModule>,
    pub definition: NavItem,
}

/// Which contribution index a conflict occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionKind {
    Task,
    ApiType,
    Page,
}

impl fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributionKind::Task => write!(f, "task type"),
            ContributionKind::ApiType => write!(f, "API type"),
            ContributionKind::Page => write!(f, "page key"),
        }
    }
}

/// A recorded key collision: the first-registered module kept the key, the
/// later claim was ignored.
#[derive(Debug, Clone)]
pub struct ContributionConflict {
    pub kind: ContributionKind,
    pub key: String,
    pub winner_module: String,
    pub loser_module: String,
}

impl fmt::Display for ContributionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} conflict: '{}' claimed by both {} and {}, later registration ignored",
            self.kind, self.key, self.winner_module, self.loser_module
        )
    }
}

/// Aggregated view of every loaded module's contributions.
///
/// Built exactly once after the module registry is final; immutable
/// afterward.
pub struct ContributionRegistry {
    tasks: Vec<RegisteredTask>,
    api_types: Vec<RegisteredApiType>,
    pages: Vec<RegisteredPage>,
    nav_items: Vec<RegisteredNavItem>,

    // Task/API keys are case-insensitive; page keys are scoped per module.
    task_index: HashMap<String, usize>,
    api_index: HashMap<String, usize>,
    page_index: HashMap<(String, String), usize>,

    diagnostics: Vec<ContributionConflict>,
}

impl ContributionRegistry {
    /// Probe every loaded module and build the conflict-free indices.
    pub fn build(registry: &ModuleRegistry) -> Self {
        let mut tasks = Vec::new();
        let mut api_types = Vec::new();
        let mut pages = Vec::new();
        let mut nav_items = Vec::new();

        for m in registry.modules() {
            if let Some(provider) = m.instance.task_provider() {
                for t in provider.tasks(&m.context) {
                    tasks.push(RegisteredTask {
                        module: Arc::clone(m),
                        definition: normalize_task(t),
                    });
                }
            }

            if let Some(provider) = m.instance.api_provider() {
                for a in provider.api_types(&m.context) {
                    api_types.push(RegisteredApiType {
                        module: Arc::clone(m),
                        definition: normalize_api(a),
                    });
                }
            }

            if let Some(provider) = m.instance.ui_provider() {
                for p in provider.pages(&m.context) {
                    pages.push(RegisteredPage {
                        module: Arc::clone(m),
                        definition: normalize_page(p),
                    });
                }
                for n in provider.nav_items(&m.context) {
                    nav_items.push(RegisteredNavItem {
                        module: Arc::clone(m),
                        definition: normalize_nav(n),
                    });
                }
            }
        }

        let mut diagnostics = Vec::new();

        let mut task_index = HashMap::new();
        for (i, t) in tasks.iter().enumerate() {
            index_claim(
                &mut task_index,
                t.definition.task_type.to_lowercase(),
                i,
                ContributionKind::Task,
                &t.definition.task_type,
                &t.module.id,
                |i| tasks[i].module.id.clone(),
                &mut diagnostics,
            );
        }

        let mut api_index = HashMap::new();
        for (i, a) in api_types.iter().enumerate() {
            index_claim(
                &mut api_index,
                a.definition.api_type.to_lowercase(),
                i,
                ContributionKind::ApiType,
                &a.definition.api_type,
                &a.module.id,
                |i| api_types[i].module.id.clone(),
                &mut diagnostics,
            );
        }

        let mut page_index: HashMap<(String, String), usize> = HashMap::new();
        for (i, p) in pages.iter().enumerate() {
            let key = p.definition.key.clone();
            if key.is_empty() {
                continue;
            }
            let scoped = (p.module.id.clone(), key.clone());
            if let Some(&winner) = page_index.get(&scoped) {
                let conflict = ContributionConflict {
                    kind: ContributionKind::Page,
                    key: format!("{}/{}", scoped.0, key),
                    winner_module: pages[winner].module.id.clone(),
                    loser_module: p.module.id.clone(),
                };
                warn!(%conflict, "Module contribution conflict");
                diagnostics.push(conflict);
                continue;
            }
            page_index.insert(scoped, i);
        }

        Self {
            tasks,
            api_types,
            pages,
            nav_items,
            task_index,
            api_index,
            page_index,
            diagnostics,
        }
    }

    pub fn tasks(&self) -> &[RegisteredTask] {
        &self.tasks
    }

    pub fn api_types(&self) -> &[RegisteredApiType] {
        &self.api_types
    }

    pub fn pages(&self) -> &[RegisteredPage] {
        &self.pages
    }

    pub fn nav_items(&self) -> &[RegisteredNavItem] {
        &self.nav_items
    }

    /// Resolve a task type key (case-insensitive) to its winning definition.
    pub fn task_for(&self, task_type: &str) -> Option<&RegisteredTask> {
        self.task_index
            .get(&task_type.trim().to_lowercase())
            .map(|&i| &self.tasks[i])
    }

    /// Resolve an API type key (case-insensitive) to its winning definition.
    pub fn api_type_for(&self, api_type: &str) -> Option<&RegisteredApiType> {
        self.api_index
            .get(&api_type.trim().to_lowercase())
            .map(|&i| &self.api_types[i])
    }

    /// Resolve a module-scoped page key to its winning definition.
    pub fn page_for(&self, module_id: &str, key: &str) -> Option<&RegisteredPage> {
        self.page_index
            .get(&(module_id.to_string(), key.to_string()))
            .map(|&i| &self.pages[i])
    }

    /// Recorded key collisions, in discovery order.
    pub fn diagnostics(&self) -> &[ContributionConflict] {
        &self.diagnostics
    }
}

/// First claim of a key wins; later claims become diagnostics. Empty keys
/// are skipped entirely.
#[allow(clippy::too_many_arguments)]
fn index_claim(
    index: &mut HashMap<String, usize>,
    key: String,
    position: usize,
    kind: ContributionKind,
    display_key: &str,
    claimant: &str,
    winner_of: impl Fn(usize) -> String,
    diagnostics: &mut Vec<ContributionConflict>,
) {
    if key.is_empty() {
        return;
    }
    if let Some(&winner) = index.get(&key) {
        let conflict = ContributionConflict {
            kind,
            key: display_key.to_string(),
            winner_module: winner_of(winner),
            loser_module: claimant.to_string(),
        };
        warn!(%conflict, "Module contribution conflict");
        diagnostics.push(conflict);
        return;
    }
    index.insert(key, position);
}

fn trim_owned(s: &str) -> String {
    s.trim().to_string()
}

fn collapse(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn normalize_task(mut t: TaskDefinition) -> TaskDefinition {
    t.category = trim_owned(&t.category);
    t.task_type = trim_owned(&t.task_type);
    t.display_name = trim_owned(&t.display_name);
    t.description = collapse(t.description.take());
    t.icon = trim_owned(&t.icon);
    t.create_route = collapse(t.create_route.take());
    t.editor_component = collapse(t.editor_component.take());
    t
}

fn normalize_api(mut a: ApiTypeDefinition) -> ApiTypeDefinition {
    a.api_type = trim_owned(&a.api_type);
    a.display_name = trim_owned(&a.display_name);
    a.route = trim_owned(&a.route);
    a.description = collapse(a.description.take());
    a
}

fn normalize_page(mut p: PageDefinition) -> PageDefinition {
    p.key = trim_owned(&p.key);
    p.title = trim_owned(&p.title);
    p.icon = trim_owned(&p.icon);
    p.component_type = trim_owned(&p.component_type);
    p.group = collapse(p.group.take());
    p
}

fn normalize_nav(mut n: NavItem) -> NavItem {
    n.title = trim_owned(&n.title);
    n.href = trim_owned(&n.href);
    n.icon = trim_owned(&n.icon);
    n.group = collapse(n.group.take());
    n
}
