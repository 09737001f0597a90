use super::*;
pub(super) fn handle_config(session: &Session, args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Init(args) => handle_init(session, args),
        ConfigCommands::Show => {
            let store = session.open_store()?;
            println!("Config: {}", store.path().display());
            println!("{}", render_config(&store.snapshot()?));
            Ok(())
        }
        ConfigCommands::Reset => {
            let store = ConfigStore::reset(&session.config_path)
                .with_context(|| format!("reset config {}", session.config_path.display()))?;
            println!("Config reset to defaults at {}", store.path().display());
            Ok(())
        }
        ConfigCommands::Select(args) => {
            let store = session.open_store()?;
            store.set_selected_branches(args.branches)?;
            let selected = store.snapshot()?.selected_branches;
            println!("Selected branches: {}", join_branches(selected.iter().copied()));
            Ok(())
        }
        ConfigCommands::Installed(args) => {
            let store = session.open_store()?;
            store.set_installed_branch(args.branch)?;
            match args.branch {
                Some(branch) => println!("Steam branch recorded as {branch}"),
                None => println!("Steam branch cleared"),
            }
            Ok(())
        }
    }
}

fn handle_init(session: &Session, args: InitArgs) -> anyhow::Result<()> {
    let store = session.open_store()?;
    for (label, path) in [
        ("steam library", &args.steam_library),
        ("game install", &args.game_install),
    ] {
        if let Some(path) = path
            && !path.is_dir()
        {
            warn!(path = %path.display(), "{label} path does not exist yet");
        }
    }
    store.set_paths(args.steam_library, args.game_install, args.managed_env)?;
    if store.was_migrated() {
        println!("Config migrated and saved to {}", store.path().display());
    } else {
        println!("Config saved to {}", store.path().display());
    }
    Ok(())
}

fn join_branches(branches: impl IntoIterator<Item = BranchKind>) -> String {
    let names: Vec<String> = branches.into_iter().map(|branch| branch.to_string()).collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

fn show_path(path: &Option<PathBuf>) -> String {
    path.as_deref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(super) fn render_config(config: &DevEnvironmentConfig) -> String {
    let mut lines = vec![
        format!("steam library:     {}", show_path(&config.steam_library_path)),
        format!("game install:      {}", show_path(&config.game_install_path)),
        format!("managed env:       {}", show_path(&config.managed_environment_path)),
        format!(
            "selected branches: {}",
            join_branches(config.selected_branches.iter().copied())
        ),
        format!(
            "installed branch:  {}",
            config
                .installed_branch
                .map(|branch| branch.to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        format!("last updated:      {}", timestamp::format(&config.last_updated)),
        format!("config version:    {}", config.config_version),
    ];
    if !config.branch_build_ids.is_empty() {
        lines.push("builds:".to_string());
        for (branch, info) in &config.branch_build_ids {
            lines.push(format!(
                "  {branch}: {} ({})",
                info.build_id,
                timestamp::format(&info.updated_time)
            ));
        }
    }
    if !config.custom_launch_commands.is_empty() {
        lines.push("launch commands:".to_string());
        for (branch, command) in &config.custom_launch_commands {
            lines.push(format!("  {branch}: {command}"));
        }
    }
    lines.join("\n")
}
