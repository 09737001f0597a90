use super::*;

/// Settings shared by every command: where the config lives and which game
/// is being managed.
pub(in crate::cli) struct Session {
    pub(in crate::cli) config_path: PathBuf,
    pub(in crate::cli) profile: GameProfile,
}

impl Session {
    pub(in crate::cli) fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => default_config_path().context("resolve default config path")?,
        };
        let mut profile = GameProfile::default();
        if let Some(app_id) = cli.app_id {
            profile.app_id = app_id;
        }
        if let Some(executable) = &cli.executable {
            profile.executable_name = executable.clone();
        }
        Ok(Self {
            config_path,
            profile,
        })
    }

    pub(in crate::cli) fn open_store(&self) -> anyhow::Result<ConfigStore> {
        match ConfigStore::open(&self.config_path) {
            Ok(store) => {
                if store.was_migrated() {
                    eprintln!(
                        "Config migrated to the current format at {}",
                        self.config_path.display()
                    );
                }
                Ok(store)
            }
            Err(err @ ConfigError::Corrupt { .. }) => Err(anyhow::Error::new(err)
                .context("config is unreadable; run `branch-sync config reset` to start over")),
            Err(err) => Err(err)
                .with_context(|| format!("open config {}", self.config_path.display())),
        }
    }
}

pub(in crate::cli) fn branch_locks(config: &DevEnvironmentConfig) -> anyhow::Result<BranchLocks> {
    let managed = config
        .managed_environment_path
        .as_deref()
        .context("managed environment path is not configured; run config init")?;
    Ok(BranchLocks::for_environment(managed))
}

pub(in crate::cli) fn manifest_source(
    config: &DevEnvironmentConfig,
    profile: &GameProfile,
) -> Box<dyn ManifestSource + Send> {
    match LibraryManifest::from_config(config, profile) {
        Some(manifest) => Box::new(manifest),
        None => Box::new(NoManifest),
    }
}

pub(in crate::cli) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub(in crate::cli) fn format_time(value: Option<time::PrimitiveDateTime>) -> String {
    value
        .map(|value| timestamp::format(&value))
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::cli) struct StatusRow {
    pub(in crate::cli) branch: String,
    pub(in crate::cli) display_name: String,
    pub(in crate::cli) status: String,
    pub(in crate::cli) local_build_id: String,
    pub(in crate::cli) steam_build_id: String,
    pub(in crate::cli) file_count: u64,
    pub(in crate::cli) directory_size: u64,
    pub(in crate::cli) mods_dll_count: usize,
    pub(in crate::cli) last_modified: Option<String>,
    pub(in crate::cli) current: bool,
    pub(in crate::cli) detail: Option<String>,
}

pub(in crate::cli) fn status_rows(
    results: &[(BranchKind, Result<BranchInfo, StatusError>)],
) -> Vec<StatusRow> {
    results
        .iter()
        .map(|(branch, result)| match result {
            Ok(info) => StatusRow {
                branch: info.branch.to_string(),
                display_name: info.display_name.clone(),
                status: info.status.to_string(),
                local_build_id: info.local_build_id.clone(),
                steam_build_id: info.steam_build_id.clone(),
                file_count: info.file_count,
                directory_size: info.directory_size,
                mods_dll_count: info.mods_dll_count,
                last_modified: info.last_modified.map(|value| timestamp::format(&value)),
                current: info.is_current_steam_branch,
                detail: info.status_detail.clone(),
            },
            Err(err) => StatusRow {
                branch: branch.to_string(),
                display_name: branch.display_name().to_string(),
                status: match err {
                    StatusError::BranchBusy(_) => "busy".to_string(),
                    _ => BranchStatus::Error.to_string(),
                },
                local_build_id: String::new(),
                steam_build_id: String::new(),
                file_count: 0,
                directory_size: 0,
                mods_dll_count: 0,
                last_modified: None,
                current: false,
                detail: Some(err.to_string()),
            },
        })
        .collect()
}

/// Aligned text table; the branch Steam currently has installed is starred.
pub(in crate::cli) fn render_status_table(rows: &[StatusRow]) -> String {
    let header = [
        "BRANCH", "STATUS", "LOCAL", "STEAM", "FILES", "SIZE", "MODS", "MODIFIED",
    ]
    .map(str::to_string);
    let cells: Vec<[String; 8]> = rows
        .iter()
        .map(|row| {
            [
                row.branch.clone(),
                row.status.clone(),
                dash_if_empty(&row.local_build_id),
                dash_if_empty(&row.steam_build_id),
                row.file_count.to_string(),
                format_size(row.directory_size),
                row.mods_dll_count.to_string(),
                row.last_modified.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths = header.clone().map(|cell| cell.len());
    for line in &cells {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.len());
        }
    }
    let render = |marker: &str, line: &[String; 8]| {
        let joined = line
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        format!("{marker} {}", joined.trim_end())
    };

    let mut out = vec![render(" ", &header)];
    for (row, line) in rows.iter().zip(&cells) {
        out.push(render(if row.current { "*" } else { " " }, line));
    }
    for row in rows {
        if let Some(detail) = &row.detail {
            out.push(format!("{}: {detail}", row.branch));
        }
    }
    out.join("\n")
}

fn dash_if_empty(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

pub(in crate::cli) fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    if total == 0 || width == 0 {
        return "[]".to_string();
    }
    let filled = ((step as f32 / total as f32) * width as f32).round() as usize;
    let filled = filled.min(width);
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(empty))
}

pub(in crate::cli) fn render_transfer_progress(
    branch: BranchKind,
    last_len: &Cell<usize>,
    progress: &TransferProgress,
) {
    let total = progress.total_files;
    let done = progress.completed_files.min(total);
    let line = format!(
        "{} {} {:>3}% {} {}/{} {}",
        progress.kind.as_str(),
        branch,
        progress.percent,
        render_progress_bar(done, total, 20),
        done,
        total,
        progress.current_file
    );
    let prev_len = last_len.get();
    if line.len() < prev_len {
        print!("\r{line}{}", " ".repeat(prev_len - line.len()));
    } else {
        print!("\r{line}");
    }
    let _ = io::stdout().flush();
    last_len.set(line.len());
    if done == total {
        println!();
        last_len.set(0);
    }
}

pub(in crate::cli) fn outcome_summary(branch: BranchKind, outcome: &TransferOutcome) -> String {
    match outcome {
        TransferOutcome::Completed(report) => {
            let verb = match report.kind {
                TransferKind::Install => "Installed",
                TransferKind::Update => "Updated",
                TransferKind::Delete => "Deleted",
            };
            format!(
                "{verb} {branch}: {} file(s), {}",
                report.files,
                format_size(report.bytes)
            )
        }
        TransferOutcome::Cancelled {
            files_completed,
            total_files,
            partial_dir,
        } => {
            let mut line =
                format!("Cancelled {branch} after {files_completed}/{total_files} file(s)");
            if let Some(dir) = partial_dir {
                line.push_str(&format!("; {} is only partially processed", dir.display()));
            }
            line
        }
    }
}
