use super::*;
pub(super) async fn handle_status(
    session: Session,
    args: StatusArgs,
    log_buffer: &logging::LogBuffer,
) -> anyhow::Result<()> {
    let store = session.open_store()?;
    let config = store.snapshot()?;
    let branches = if !args.branches.is_empty() {
        args.branches
    } else if !config.selected_branches.is_empty() {
        config.selected_branches.iter().copied().collect()
    } else {
        BranchKind::ALL.to_vec()
    };

    let mark = log_buffer.mark();
    let profile = session.profile;
    let results = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let locks = branch_locks(&config)?;
        let manifest = manifest_source(&config, &profile);
        let resolver = StatusResolver::new(&store, &locks, manifest.as_ref(), &profile);
        resolver
            .resolve_all(&branches)
            .context("resolve branch status")
    })
    .await
    .context("status worker")??;

    let rows = status_rows(&results);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    println!("{}", render_status_table(&rows));

    let warnings = log_buffer.entries_since(mark);
    if !warnings.is_empty() {
        println!();
        println!("Warnings:");
        for entry in warnings {
            println!("  {}", entry.format_compact());
        }
    }
    Ok(())
}
