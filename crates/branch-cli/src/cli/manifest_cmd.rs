use super::*;
pub(super) fn handle_manifest(session: &Session, args: ManifestArgs) -> anyhow::Result<()> {
    match args.command {
        ManifestCommands::Show(args) => handle_show(session, args),
    }
}

fn handle_show(session: &Session, args: ManifestShowArgs) -> anyhow::Result<()> {
    let config = match args.path {
        Some(_) => None,
        None => Some(session.open_store()?.snapshot()?),
    };
    let path = match (&args.path, &config) {
        (Some(path), _) => path.clone(),
        (None, Some(config)) => LibraryManifest::from_config(config, &session.profile)
            .and_then(|manifest| manifest.manifest_path())
            .context("steam library path is not configured; run config init")?,
        (None, None) => anyhow::bail!("no manifest to read"),
    };
    let record = read_manifest(&path).with_context(|| format!("read {}", path.display()))?;
    println!("Manifest: {}", path.display());
    println!("{}", render_manifest(&record));

    if let Some(config) = config {
        for branch in BranchKind::ALL {
            let Some(folder) = config.branch_folder(branch) else {
                break;
            };
            if !folder.is_dir() {
                continue;
            }
            match manifest_drift(&folder, session.profile.app_id, &record) {
                Ok(true) => println!("{branch}: branch copy was taken from a different build"),
                Ok(false) => println!("{branch}: branch copy matches this build"),
                Err(err) => println!("{branch}: no manifest copy ({err})"),
            }
        }
    }
    Ok(())
}

pub(super) fn render_manifest(record: &ManifestRecord) -> String {
    let mut lines = vec![
        format!("app id:         {}", record.app_id),
        format!("name:           {}", record.name),
        format!(
            "build id:       {}",
            record.build_id_string().unwrap_or_else(|| "-".to_string())
        ),
        format!(
            "branch:         {}",
            detect_active_branch(record)
                .map(|branch| branch.to_string())
                .unwrap_or_else(|| format!(
                    "unknown ({})",
                    record.beta_key.as_deref().unwrap_or_default()
                ))
        ),
        format!("install dir:    {}", record.install_dir),
        format!("size on disk:   {}", format_size(record.size_on_disk)),
        format!("last updated:   {}", format_time(record.last_updated())),
        format!(
            "state:          {}",
            if record.is_fully_installed() {
                "fully installed"
            } else {
                "not fully installed"
            }
        ),
    ];
    for issue in &record.issues {
        lines.push(format!(
            "issue: {} = {:?} ({})",
            issue.field, issue.raw, issue.reason
        ));
    }
    lines.join("\n")
}
