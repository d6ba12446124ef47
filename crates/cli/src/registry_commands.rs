use {
    anyhow::{Context, Result},
    clap::Subcommand,
};

use crate::{app::App, output};

#[derive(Subcommand)]
pub enum RegistryAction {
    /// Clone a registry and add it to the config.
    Add {
        /// Git URL of the registry repository.
        url: String,
        /// Name to register under (defaults to the manifest name).
        #[arg(long)]
        name: Option<String>,
    },
    /// List configured registries.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Pull one registry, or all of them.
    Refresh { name: Option<String> },
    /// Remove a registry and its local clone.
    Remove { name: String },
    /// Show a registry's manifest summary.
    Info { name: String },
    /// Show the skills and MCP servers registries offer.
    Catalog {
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_registry(app: &App, action: RegistryAction) -> Result<()> {
    let store = app.registry_store();
    match action {
        RegistryAction::Add { url, name } => {
            let manifest = store
                .add(&app.config, &url, name.as_deref())
                .await
                .map_err(output::registry_error)?;
            output::print_warnings(&manifest.warnings);
            println!(
                "added registry {} ({} skills, {} MCP servers)",
                manifest.value.name,
                manifest.value.skills.len(),
                manifest.value.mcps.len()
            );
        },
        RegistryAction::List { json } => {
            let infos: Vec<_> = app.registries()?.iter().map(|r| store.info(r)).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&infos)?);
            } else if infos.is_empty() {
                println!("no registries configured");
            } else {
                let rows: Vec<Vec<String>> = infos
                    .iter()
                    .map(|i| {
                        vec![
                            i.name.clone(),
                            i.repo.clone(),
                            i.skills.to_string(),
                            i.mcps.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    output::table(&["NAME", "REPO", "SKILLS", "MCPS"], &rows)
                );
            }
        },
        RegistryAction::Refresh { name } => {
            let mut registries = app.registries()?;
            if let Some(name) = name {
                registries.retain(|r| r.name == name || r.repo == name);
                if registries.is_empty() {
                    anyhow::bail!("registry '{name}' is not configured");
                }
            }
            let mut failed = 0;
            for r in store.refresh_all(&registries).await {
                match r.outcome {
                    Ok(manifest) => {
                        output::print_warnings(&manifest.warnings);
                        println!("refreshed {}", r.name);
                    },
                    Err(e) => {
                        failed += 1;
                        eprintln!("registry {} failed to refresh: {e}", r.name);
                        if let Some(clone) = e.as_clone_error() {
                            output::print_clone_error(clone);
                        }
                    },
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} registries failed to refresh", registries.len());
            }
        },
        RegistryAction::Remove { name } => {
            let removed = store.remove(&app.config, &name)?;
            println!("removed registry {} ({})", removed.name, removed.repo);
        },
        RegistryAction::Info { name } => {
            let config = app.load_config()?;
            let reg = config
                .find_registry(&name)
                .with_context(|| format!("registry '{name}' is not configured"))?;
            let info = store.info(reg);
            println!("name:        {}", info.name);
            println!("repo:        {}", info.repo);
            println!("clone:       {}", info.path.display());
            if !info.cloned {
                println!("             (not cloned, run `duckrow registry refresh`)");
            }
            if !info.manifest_name.is_empty() {
                println!("manifest:    {}", info.manifest_name);
            }
            if !info.description.is_empty() {
                println!("description: {}", info.description);
            }
            println!("skills:      {}", info.skills);
            println!("mcps:        {}", info.mcps);
        },
        RegistryAction::Catalog { json } => {
            let registries = app.registries()?;
            let skills = store.list_skills(&registries);
            let mcps = store.list_mcps(&registries);
            output::print_warnings(&skills.warnings);
            output::print_warnings(&mcps.warnings);
            if json {
                let value = serde_json::json!({ "skills": skills.value, "mcps": mcps.value });
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }
            let mut rows: Vec<Vec<String>> = skills
                .value
                .iter()
                .map(|s| {
                    vec![
                        "skill".into(),
                        s.entry.name.clone(),
                        s.registry.clone(),
                        s.entry.description.clone(),
                    ]
                })
                .collect();
            rows.extend(mcps.value.iter().map(|m| {
                vec![
                    "mcp".into(),
                    m.entry.name.clone(),
                    m.registry.clone(),
                    m.entry.description.clone(),
                ]
            }));
            println!(
                "{}",
                output::table(&["KIND", "NAME", "REGISTRY", "DESCRIPTION"], &rows)
            );
        },
    }
    Ok(())
}
