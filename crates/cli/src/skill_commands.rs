use std::collections::BTreeSet;

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    duckrow_lock::LockStore,
    duckrow_mcp::{DriftState, McpWriter},
    duckrow_registry::{RegistrySkill, UpdateInfo, detect_updates},
    duckrow_skills::{
        BatchResult, InstallOptions, InstalledSkill, discover::list_installed,
        parse_registry_source,
    },
    tracing::info,
};

use crate::{
    app::App,
    output::{self, short_commit},
};

#[derive(Args)]
pub struct InstallArgs {
    /// `owner/repo[@skill][#ref]`, a git URL, a local path, or with
    /// `--registry` a skill name from a registry.
    pub source: String,

    /// Agents that should see the skill (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub agents: Vec<String>,

    /// Only install this skill from the source.
    #[arg(long)]
    pub skill: Option<String>,

    /// Look `source` up as a skill name in this registry.
    #[arg(long)]
    pub registry: Option<String>,

    /// Include skills marked internal.
    #[arg(long)]
    pub internal: bool,

    /// Record the install in duckrow.lock.json even if none exists yet.
    #[arg(long)]
    pub lock: bool,
}

#[derive(Args)]
pub struct UninstallArgs {
    pub name: String,

    /// Keep the lock entry.
    #[arg(long)]
    pub keep_lock: bool,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Skill to update.
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub name: Option<String>,

    /// Update every skill with a newer registry commit.
    #[arg(long)]
    pub all: bool,

    /// Use cached registry clones instead of pulling first.
    #[arg(long)]
    pub no_refresh: bool,
}

/// Lock bookkeeping happens when asked for or when the project already
/// tracks assets.
fn lock_for(app: &App, requested: bool) -> Option<LockStore> {
    let lock = app.lock();
    (requested || lock.exists()).then_some(lock)
}

pub async fn install(app: &App, args: InstallArgs) -> Result<()> {
    let agents = app.target_agents(&args.agents);
    let lock = lock_for(app, args.lock);
    let manager = app.skills()?;

    let mut opts = InstallOptions::new(&app.project).with_agents(agents);
    if args.internal {
        opts = opts.including_internal();
    }

    let installed = match &args.registry {
        Some(registry) => {
            let skill = find_registry_skill(app, registry, &args.source)?;
            let parsed = parse_registry_source(&skill.entry.source, skill.entry.version.as_deref())
                .map_err(output::skill_error)?
                .with_overrides(&app.overrides()?);
            opts = opts.with_asset(args.skill.unwrap_or_else(|| skill.entry.name.clone()));
            if let Some(commit) = skill.entry.pinned_commit() {
                opts = opts.with_commit(commit);
            }
            manager
                .install_parsed(&parsed, &skill.entry.source, &opts, lock.as_ref())
                .await
                .map_err(output::skill_error)?
        },
        None => {
            if let Some(skill) = args.skill {
                opts = opts.with_asset(skill);
            }
            manager
                .install(&args.source, &opts, lock.as_ref())
                .await
                .map_err(output::skill_error)?
        },
    };

    print_installed(&installed);
    app.remember_project();
    Ok(())
}

fn find_registry_skill(app: &App, registry: &str, name: &str) -> Result<RegistrySkill> {
    let config = app.load_config()?;
    let reg = config
        .find_registry(registry)
        .with_context(|| format!("registry '{registry}' is not configured"))?;
    let catalog = app.registry_store().list_skills(std::slice::from_ref(reg));
    output::print_warnings(&catalog.warnings);
    catalog
        .value
        .into_iter()
        .find(|s| s.entry.name.eq_ignore_ascii_case(name))
        .with_context(|| format!("registry '{registry}' has no skill named '{name}'"))
}

fn print_installed(installed: &[InstalledSkill]) {
    for skill in installed {
        let commit = if skill.commit.is_empty() {
            String::new()
        } else {
            format!(" @ {}", short_commit(&skill.commit))
        };
        println!(
            "installed {}{commit} -> {}",
            skill.name,
            skill.agents.join(", ")
        );
    }
}

pub fn uninstall(app: &App, args: UninstallArgs) -> Result<()> {
    let lock = (!args.keep_lock).then(|| app.lock());
    let removal = app
        .skills()?
        .uninstall(&args.name, &app.project, lock.as_ref())?;
    output::print_warnings(&removal.warnings);
    if !removal.value.canonical_removed && removal.value.unlinked.is_empty() {
        println!("{} was not installed", args.name);
    } else {
        println!("removed {}", args.name);
    }
    Ok(())
}

pub fn list(app: &App, json: bool) -> Result<()> {
    let lock = app.lock().read()?;
    let on_disk = list_installed(&app.project);

    if json {
        let value = serde_json::json!({
            "assets": lock.installed_assets(),
            "untracked": on_disk
                .iter()
                .filter(|s| lock.find_skill(&s.dir_name).is_none())
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let disk: BTreeSet<&str> = on_disk.iter().map(|s| s.dir_name.as_str()).collect();
    let writer = McpWriter::default();
    let mut rows = Vec::new();
    for skill in &lock.skills {
        let state = if disk.contains(skill.name.as_str()) {
            "ok"
        } else {
            "missing"
        };
        rows.push(vec![
            "skill".into(),
            skill.name.clone(),
            short_commit(&skill.commit).to_string(),
            skill.agents.join(","),
            state.into(),
        ]);
    }
    for skill in on_disk.iter().filter(|s| lock.find_skill(&s.dir_name).is_none()) {
        rows.push(vec![
            "skill".into(),
            skill.dir_name.clone(),
            String::new(),
            String::new(),
            "untracked".into(),
        ]);
    }
    for mcp in &lock.mcps {
        let drift = writer.check_drift(&app.project, mcp);
        let state = if drift.iter().all(|d| d.state == DriftState::InSync) {
            "ok".to_string()
        } else {
            drift
                .iter()
                .filter(|d| d.state != DriftState::InSync)
                .map(|d| format!("{}:{}", d.agent, drift_label(d.state)))
                .collect::<Vec<_>>()
                .join(",")
        };
        rows.push(vec![
            "mcp".into(),
            mcp.name.clone(),
            String::new(),
            mcp.agents.join(","),
            state,
        ]);
    }

    if rows.is_empty() {
        println!("nothing installed");
    } else {
        println!(
            "{}",
            output::table(&["KIND", "NAME", "COMMIT", "AGENTS", "STATE"], &rows)
        );
    }
    Ok(())
}

fn drift_label(state: DriftState) -> &'static str {
    match state {
        DriftState::InSync => "ok",
        DriftState::Modified => "modified",
        DriftState::Missing => "missing",
    }
}

pub async fn sync(app: &App) -> Result<()> {
    let lock = app.lock();
    if !lock.exists() {
        bail!("no {} in {}", duckrow_lock::LOCK_FILE_NAME, app.project.display());
    }
    let batch = app.skills()?.sync(&app.project, &lock).await?;
    print_batch("synced", &batch)
}

async fn available_updates(app: &App, refresh: bool) -> Result<Vec<UpdateInfo>> {
    if refresh {
        let registries = app.registries()?;
        for r in app.registry_store().refresh_all(&registries).await {
            if let Err(e) = r.outcome {
                eprintln!("warning: registry {}: {e}", r.name);
            }
        }
    }
    let map = app.commit_map().await?;
    Ok(detect_updates(&app.lock().read()?, &map))
}

pub async fn update(app: &App, args: UpdateArgs) -> Result<()> {
    let lock = app.lock();
    let infos = available_updates(app, !args.no_refresh).await?;

    let selected: Vec<&UpdateInfo> = match &args.name {
        Some(name) => {
            let info = infos
                .iter()
                .find(|i| &i.name == name)
                .with_context(|| format!("skill '{name}' is not in the lock file"))?;
            vec![info]
        },
        None => infos.iter().collect(),
    };

    let pending: Vec<(String, Option<String>)> = selected
        .iter()
        .filter(|i| i.has_update)
        .map(|i| (i.name.clone(), Some(i.available_commit.clone())))
        .collect();
    if pending.is_empty() {
        println!("everything is up to date");
        return Ok(());
    }
    info!(count = pending.len(), "updating skills");
    let batch = app.skills()?.update_all(&app.project, pending, &lock).await;
    print_batch("updated", &batch)
}

pub async fn outdated(app: &App, json: bool) -> Result<()> {
    let infos = available_updates(app, false).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = infos
        .iter()
        .filter(|i| i.has_update)
        .map(|i| {
            vec![
                i.name.clone(),
                short_commit(&i.installed_commit).to_string(),
                short_commit(&i.available_commit).to_string(),
                i.source.clone(),
            ]
        })
        .collect();
    if rows.is_empty() {
        println!("everything is up to date");
    } else {
        println!(
            "{}",
            output::table(&["NAME", "INSTALLED", "AVAILABLE", "SOURCE"], &rows)
        );
    }
    Ok(())
}

fn print_batch(verb: &str, batch: &BatchResult) -> Result<()> {
    println!(
        "{verb} {}, failed {}, skipped {}",
        batch.succeeded, batch.failed, batch.skipped
    );
    for (name, err) in &batch.errors {
        eprintln!("  {name}: {err}");
    }
    if !batch.is_success() {
        bail!("{} of {} failed", batch.failed, batch.succeeded + batch.failed);
    }
    Ok(())
}
