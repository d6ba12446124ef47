use {anyhow::Result, clap::Subcommand};

use crate::app::{App, absolute};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the config file location and contents.
    Show,
    /// Clone URL overrides, keyed by `owner/repo`.
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },
    /// Turn automatic folder tracking on or off.
    AutoAdd {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Subcommand)]
pub enum OverrideAction {
    /// Clone `owner/repo` from `url` instead of its default host.
    Set { repo: String, url: String },
    Remove { repo: String },
    List,
}

#[derive(Subcommand)]
pub enum FolderAction {
    /// Track a project folder (defaults to the project directory).
    Add { path: Option<String> },
    Remove { path: Option<String> },
    List,
}

pub fn handle_config(app: &App, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", app.config.config_path().display());
            println!("{}", serde_json::to_string_pretty(&app.load_config()?)?);
        },
        ConfigAction::Override { action } => match action {
            OverrideAction::Set { repo, url } => {
                app.config.update(|c| {
                    c.set_clone_url_override(&repo, &url);
                    Ok(())
                })?;
                println!("{repo} will be cloned from {url}");
            },
            OverrideAction::Remove { repo } => {
                if app.config.update(|c| Ok(c.remove_clone_url_override(&repo)))? {
                    println!("removed override for {repo}");
                } else {
                    println!("no override for {repo}");
                }
            },
            OverrideAction::List => {
                for (repo, url) in app.overrides()? {
                    println!("{repo} -> {url}");
                }
            },
        },
        ConfigAction::AutoAdd { enabled } => {
            app.config.update(|c| {
                c.settings.auto_add_current_dir = enabled;
                Ok(())
            })?;
        },
    }
    Ok(())
}

pub fn handle_folders(app: &App, action: FolderAction) -> Result<()> {
    let resolve = |path: Option<String>| match path {
        Some(p) => absolute(std::path::Path::new(&p)).to_string_lossy().into_owned(),
        None => absolute(&app.project).to_string_lossy().into_owned(),
    };
    match action {
        FolderAction::Add { path } => {
            let path = resolve(path);
            if app.config.update(|c| Ok(c.add_folder(&path)))? {
                println!("tracking {path}");
            }
        },
        FolderAction::Remove { path } => {
            let path = resolve(path);
            if !app.config.update(|c| Ok(c.remove_folder(&path)))? {
                println!("{path} was not tracked");
            }
        },
        FolderAction::List => {
            for folder in app.load_config()?.folders {
                println!("{}", folder.path);
            }
        },
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn override_set_then_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let app = App::new(Some(tmp.path().to_path_buf()), Some(tmp.path().to_path_buf())).unwrap();
        handle_config(&app, ConfigAction::Override {
            action: OverrideAction::Set {
                repo: "acme/skills".into(),
                url: "git@mirror:acme/skills.git".into(),
            },
        })
        .unwrap();
        assert_eq!(
            app.overrides().unwrap().get("acme/skills").map(String::as_str),
            Some("git@mirror:acme/skills.git")
        );
        handle_config(&app, ConfigAction::Override {
            action: OverrideAction::Remove {
                repo: "acme/skills".into(),
            },
        })
        .unwrap();
        assert!(app.overrides().unwrap().is_empty());
    }

    #[test]
    fn folders_add_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let app = App::new(Some(tmp.path().join("cfg")), Some(tmp.path().to_path_buf())).unwrap();
        handle_folders(&app, FolderAction::Add { path: None }).unwrap();
        assert_eq!(app.load_config().unwrap().folders.len(), 1);
        handle_folders(&app, FolderAction::Remove { path: None }).unwrap();
        assert!(app.load_config().unwrap().folders.is_empty());
    }
}
