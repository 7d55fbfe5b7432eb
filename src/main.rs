use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use telepanel::config::PanelConfig;
use telepanel::modules::{
    host_version, resolve_modules_root, Bootstrapper, ContributionRegistry, ModuleLayout,
    ModuleStateStore, RouteTable, ServiceCollection,
};

#[derive(Parser)]
#[command(name = "telepanel")]
#[command(about = "Telegram panel server with a versioned module system", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap all modules and serve
    Serve,
    /// Manage installed modules
    Modules {
        #[command(subcommand)]
        action: ModulesAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ModulesAction {
    /// List the module ledger
    List,
    /// Enable a module by id (takes effect on next boot)
    Enable { id: String },
    /// Disable a module by id (takes effect on next boot)
    Disable { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PanelConfig::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let layout = ModuleLayout::new(resolve_modules_root(config.modules_root().as_deref()));

    match cli.command {
        Some(Commands::Version) | None => {
            println!("telepanel {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve) => serve(layout).await?,
        Some(Commands::Modules { action }) => match action {
            ModulesAction::List => list_modules(&layout)?,
            ModulesAction::Enable { id } => set_enabled(&layout, &id, true)?,
            ModulesAction::Disable { id } => set_enabled(&layout, &id, false)?,
        },
    }

    Ok(())
}

async fn serve(layout: ModuleLayout) -> anyhow::Result<()> {
    info!(root = %layout.root.display(), host = %host_version(), "Starting module bootstrap");

    let bootstrapper = Bootstrapper::new(layout, host_version());
    let mut services = ServiceCollection::new();
    let registry = bootstrapper.run(&mut services)?;

    let mut routes = RouteTable::new();
    registry.register_routes(&mut routes);

    let contributions = ContributionRegistry::build(&registry);
    for conflict in contributions.diagnostics() {
        warn!(%conflict, "Contribution conflict");
    }

    info!(
        modules = registry.len(),
        routes = routes.len(),
        tasks = contributions.tasks().len(),
        api_types = contributions.api_types().len(),
        pages = contributions.pages().len(),
        "Panel ready"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}

fn list_modules(layout: &ModuleLayout) -> anyhow::Result<()> {
    let store = ModuleStateStore::new(layout.clone());
    let state = store.load()?;

    if state.modules.is_empty() {
        println!("No modules in the ledger.");
        return Ok(());
    }

    for item in &state.modules {
        println!(
            "{:<32} {:<10} active={:<10} lastGood={:<10} {}",
            item.id,
            if item.enabled { "enabled" } else { "disabled" },
            item.active_version.as_deref().unwrap_or("-"),
            item.last_good_version.as_deref().unwrap_or("-"),
            if item.built_in { "built-in" } else { "" },
        );
    }
    Ok(())
}

fn set_enabled(layout: &ModuleLayout, id: &str, enabled: bool) -> anyhow::Result<()> {
    let store = ModuleStateStore::new(layout.clone());
    let mut state = store.load()?;

    match state.find_mut(id) {
        Some(item) => {
            item.enabled = enabled;
            store.save(&mut state)?;
            println!(
                "Module '{}' {}. Takes effect on next boot.",
                id,
                if enabled { "enabled" } else { "disabled" }
            );
            Ok(())
        }
        None => anyhow::bail!("Module '{}' is not in the ledger", id),
    }
}
