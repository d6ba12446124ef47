use {
    anyhow::{Context, Result},
    clap::Subcommand,
    duckrow_config::{EnvFiles, EnvSource},
    duckrow_mcp::{EnvResolver, McpWriter},
    duckrow_registry::RegistryMcp,
};

use crate::{app::App, output};

#[derive(Subcommand)]
pub enum McpAction {
    /// Write a registry MCP server into agent configs.
    Install {
        name: String,
        /// Registry to take the entry from when several offer it.
        #[arg(long)]
        registry: Option<String>,
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,
        /// Do not record the server in duckrow.lock.json.
        #[arg(long)]
        no_lock: bool,
    },
    /// Remove an MCP server from agent configs.
    Uninstall {
        name: String,
        /// Agents to remove it from (defaults to the ones in the lock file).
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,
    },
    /// Show which required environment variables are set.
    Env { name: String },
}

pub fn handle_mcp(app: &App, action: McpAction) -> Result<()> {
    let writer = McpWriter::default();
    match action {
        McpAction::Install {
            name,
            registry,
            agents,
            no_lock,
        } => {
            let found = find_mcp(app, &name, registry.as_deref())?;
            let mut agents = app.target_agents(&agents);
            let capable = writer.capable_agents();
            if agents.iter().all(|a| !capable.contains(a)) && !capable.is_empty() {
                // Nothing detected can hold MCP config; fall back to every capable agent.
                agents = capable;
            }
            let lock = (!no_lock).then(|| app.lock());
            let result = writer.install(
                &found.entry,
                &found.registry,
                &app.project,
                &agents,
                lock.as_ref(),
            )?;
            output::print_warnings(&result.warnings);
            for path in &result.value.config_paths {
                println!("wrote {} to {}", name, path.display());
            }
            report_env(app, &result.value.required_env)?;
            app.remember_project();
        },
        McpAction::Uninstall { name, agents } => {
            let lock = app.lock();
            let agents = if agents.is_empty() {
                lock.read()?
                    .find_mcp(&name)
                    .map(|m| m.agents.clone())
                    .unwrap_or_else(|| writer.capable_agents())
            } else {
                agents
            };
            let removed = writer.uninstall(&name, &app.project, &agents, Some(&lock))?;
            output::print_warnings(&removed.warnings);
            if removed.value.is_empty() {
                println!("{name} was not configured for any agent");
            } else {
                println!("removed {name} from {}", removed.value.join(", "));
            }
        },
        McpAction::Env { name } => {
            let required = app
                .lock()
                .read()?
                .find_mcp(&name)
                .map(|m| m.required_env.clone())
                .with_context(|| format!("MCP server '{name}' is not in the lock file"))?;
            report_env(app, &required)?;
        },
    }
    Ok(())
}

fn find_mcp(app: &App, name: &str, registry: Option<&str>) -> Result<RegistryMcp> {
    let mut registries = app.registries()?;
    if let Some(registry) = registry {
        registries.retain(|r| r.name == registry || r.repo == registry);
        if registries.is_empty() {
            anyhow::bail!("registry '{registry}' is not configured");
        }
    }
    let catalog = app.registry_store().list_mcps(&registries);
    output::print_warnings(&catalog.warnings);
    let mut matches: Vec<RegistryMcp> = catalog
        .value
        .into_iter()
        .filter(|m| m.entry.name == name)
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no registry offers an MCP server named '{name}'"),
        1 => Ok(matches.remove(0)),
        _ => {
            let names: Vec<_> = matches.iter().map(|m| m.registry.as_str()).collect();
            anyhow::bail!(
                "'{name}' is offered by several registries ({}), pick one with --registry",
                names.join(", ")
            )
        },
    }
}

fn report_env(app: &App, required: &[String]) -> Result<()> {
    if required.is_empty() {
        return Ok(());
    }
    let env = EnvFiles::load(Some(app.project.as_path()), &app.config)?;
    for status in env.resolve(required) {
        println!("  {:<24} {}", status.name, env_label(status.source));
    }
    Ok(())
}

fn env_label(source: Option<EnvSource>) -> String {
    source.map_or_else(|| "missing".to_string(), |s| s.to_string())
}
