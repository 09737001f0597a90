use super::*;
pub(super) async fn handle_transfer(
    session: Session,
    kind: TransferKind,
    branch: BranchKind,
    allow_branch_mismatch: bool,
) -> anyhow::Result<()> {
    let store = session.open_store()?;
    let config = store.snapshot()?;
    let locks = branch_locks(&config)?;
    let profile = session.profile;
    let token = CancelToken::new();
    let worker_token = token.clone();

    let mut worker = tokio::task::spawn_blocking(move || -> anyhow::Result<TransferOutcome> {
        let manifest = manifest_source(&config, &profile);
        let sync = BranchSync::new(&store, &locks, manifest.as_ref(), &profile)
            .allow_branch_mismatch(allow_branch_mismatch);
        let last_len = Cell::new(0usize);
        let report =
            |progress: TransferProgress| render_transfer_progress(branch, &last_len, &progress);
        let options = TransferOptions {
            progress: Some(&report),
            cancel: Some(&worker_token),
            ..TransferOptions::default()
        };
        let result = match kind {
            TransferKind::Install => sync.install(branch, options),
            TransferKind::Update => sync.update(branch, options),
            TransferKind::Delete => sync.delete(branch, options),
        };
        if last_len.get() > 0 {
            println!();
        }
        result.with_context(|| format!("{} {branch}", kind.as_str()))
    });

    let outcome = tokio::select! {
        joined = &mut worker => joined.context("transfer worker")??,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    eprintln!("\nCancelling {branch} after the current file...");
                    token.cancel();
                }
                Err(err) => warn!(error = %err, "ctrl-c handler unavailable"),
            }
            worker.await.context("transfer worker")??
        }
    };

    info!(branch = %branch, kind = kind.as_str(), completed = outcome.is_completed(), "transfer finished");
    println!("{}", outcome_summary(branch, &outcome));
    Ok(())
}
