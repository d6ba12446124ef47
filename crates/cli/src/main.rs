mod app;
mod config_commands;
mod mcp_commands;
mod output;
mod registry_commands;
mod skill_commands;

use std::{path::PathBuf, time::Duration};

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "duckrow",
    version,
    about = "Install skills and MCP servers from git registries into agent projects"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.duckrow/).
    #[arg(long, global = true, env = "DUCKROW_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Project directory to operate on (defaults to the current directory).
    #[arg(short = 'C', long = "dir", global = true)]
    project_dir: Option<PathBuf>,

    /// Seconds a single git command may run before it is killed.
    #[arg(long, global = true, env = "DUCKROW_GIT_TIMEOUT", default_value_t = 120)]
    git_timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Install skills from a source or a registry.
    Install(skill_commands::InstallArgs),
    /// Remove an installed skill.
    Uninstall(skill_commands::UninstallArgs),
    /// Show installed skills and MCP servers.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Reinstall locked skills that are missing on disk.
    Sync,
    /// Update skills to the commit their registry offers.
    Update(skill_commands::UpdateArgs),
    /// Show which locked skills have registry updates.
    Outdated {
        #[arg(long)]
        json: bool,
    },
    /// Registry management.
    Registry {
        #[command(subcommand)]
        action: registry_commands::RegistryAction,
    },
    /// MCP server management.
    Mcp {
        #[command(subcommand)]
        action: mcp_commands::McpAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Tracked project folders.
    Folders {
        #[command(subcommand)]
        action: config_commands::FolderAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);
    debug!(version = env!("CARGO_PKG_VERSION"), "duckrow starting");

    let app = app::App::new(cli.config_dir.clone(), cli.project_dir.clone())?
        .with_git_timeout(Duration::from_secs(cli.git_timeout));

    match cli.command {
        Commands::Install(args) => skill_commands::install(&app, args).await,
        Commands::Uninstall(args) => skill_commands::uninstall(&app, args),
        Commands::List { json } => skill_commands::list(&app, json),
        Commands::Sync => skill_commands::sync(&app).await,
        Commands::Update(args) => skill_commands::update(&app, args).await,
        Commands::Outdated { json } => skill_commands::outdated(&app, json).await,
        Commands::Registry { action } => registry_commands::handle_registry(&app, action).await,
        Commands::Mcp { action } => mcp_commands::handle_mcp(&app, action),
        Commands::Config { action } => config_commands::handle_config(&app, action),
        Commands::Folders { action } => config_commands::handle_folders(&app, action),
    }
}
