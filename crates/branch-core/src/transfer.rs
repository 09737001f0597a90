//! Cancellable, progress-reporting copy and delete of branch directory trees.
//!
//! Stamping the new build id after a completed install or update is the
//! caller's job; see [`crate::sync::BranchSync`].

use crate::scan::{TreeListing, list_tree};
use crate::transfer_progress::ProgressEmitter;
use crate::transfer_retry::with_retry;
pub use crate::transfer_types::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Copies `source` into a new branch folder at `destination`, then places a
/// shadow copy of `manifest` inside it.
pub fn install_tree(
    source: &Path,
    destination: &Path,
    manifest: Option<&Path>,
    options: TransferOptions<'_>,
) -> Result<TransferOutcome, TransferError> {
    copy_tree(TransferKind::Install, source, destination, manifest, options)
}

/// Same as [`install_tree`] over an existing folder; files are overwritten one
/// by one and files absent from `source` are left alone.
pub fn update_tree(
    source: &Path,
    destination: &Path,
    manifest: Option<&Path>,
    options: TransferOptions<'_>,
) -> Result<TransferOutcome, TransferError> {
    copy_tree(TransferKind::Update, source, destination, manifest, options)
}

pub fn delete_tree(
    target: &Path,
    options: TransferOptions<'_>,
) -> Result<TransferOutcome, TransferError> {
    if !target.exists() {
        info!(path = %target.display(), "nothing to delete");
        ProgressEmitter::new(TransferKind::Delete, 0, options).finish_empty();
        return Ok(TransferOutcome::Completed(TransferReport {
            kind: TransferKind::Delete,
            files: 0,
            bytes: 0,
            manifest_copy: None,
        }));
    }
    let listing = list(target, &options)?;
    let mut entries = listing.files;
    entries.extend(listing.links);
    entries.sort();
    let total = entries.len();
    info!(path = %target.display(), files = total, "deleting branch tree");
    let mut emitter = ProgressEmitter::new(TransferKind::Delete, total, options);
    let mut bytes = 0u64;

    for (index, relative) in entries.iter().enumerate() {
        if options.is_cancelled() {
            return Ok(cancelled(target, &entries, index));
        }
        let path = target.join(relative);
        bytes += fs::symlink_metadata(&path).map(|meta| meta.len()).unwrap_or(0);
        with_retry(&options.retry, &path, || ignore_missing(remove_entry(&path)))?;
        emitter.file_done(relative, index + 1);
    }

    for relative in listing.dirs.iter().rev() {
        let path = target.join(relative);
        with_retry(&options.retry, &path, || ignore_missing(fs::remove_dir(&path)))?;
    }
    with_retry(&options.retry, target, || ignore_missing(fs::remove_dir(target)))?;
    if total == 0 {
        emitter.finish_empty();
    }
    info!(path = %target.display(), files = total, "deleted branch tree");
    Ok(TransferOutcome::Completed(TransferReport {
        kind: TransferKind::Delete,
        files: total,
        bytes,
        manifest_copy: None,
    }))
}

/// Places a verbatim copy of the platform manifest inside `branch_dir` for
/// later drift checks.
pub fn copy_manifest(
    manifest: &Path,
    branch_dir: &Path,
    retry: &RetryPolicy,
) -> Result<PathBuf, TransferError> {
    let file_name = manifest.file_name().ok_or_else(|| TransferError::Failed {
        path: manifest.to_path_buf(),
        attempts: 0,
        source: io::Error::new(io::ErrorKind::InvalidInput, "manifest path has no file name"),
    })?;
    let destination = branch_dir.join(file_name);
    with_retry(retry, &destination, || {
        fs::create_dir_all(branch_dir)?;
        fs::copy(manifest, &destination).map(|_| ())
    })?;
    Ok(destination)
}

fn copy_tree(
    kind: TransferKind,
    source: &Path,
    destination: &Path,
    manifest: Option<&Path>,
    options: TransferOptions<'_>,
) -> Result<TransferOutcome, TransferError> {
    let listing = list(source, &options)?;
    let total = listing.files.len();
    info!(
        kind = kind.as_str(),
        source = %source.display(),
        destination = %destination.display(),
        files = total,
        "starting branch transfer"
    );

    with_retry(&options.retry, destination, || fs::create_dir_all(destination))?;
    for relative in &listing.links {
        warn!(
            path = %source.join(relative).display(),
            "skipping symlink that does not resolve to a file"
        );
    }

    let mut emitter = ProgressEmitter::new(kind, total, options);
    let mut bytes = 0u64;
    for (index, relative) in listing.files.iter().enumerate() {
        if options.is_cancelled() {
            let outcome = cancelled(destination, &listing.files, index);
            warn!(
                kind = kind.as_str(),
                destination = %destination.display(),
                completed = index,
                total,
                "branch transfer cancelled"
            );
            return Ok(outcome);
        }
        let from = source.join(relative);
        let to = destination.join(relative);
        bytes += with_retry(&options.retry, &to, || {
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&from, &to)
        })?;
        emitter.file_done(relative, index + 1);
    }
    // Parents of copied files already exist; this covers empty directories.
    for relative in &listing.dirs {
        let path = destination.join(relative);
        with_retry(&options.retry, &path, || fs::create_dir_all(&path))?;
    }
    if total == 0 {
        emitter.finish_empty();
    }

    let manifest_copy = match manifest {
        Some(manifest) => Some(copy_manifest(manifest, destination, &options.retry)?),
        None => None,
    };
    info!(
        kind = kind.as_str(),
        destination = %destination.display(),
        files = total,
        bytes,
        "branch transfer complete"
    );
    Ok(TransferOutcome::Completed(TransferReport {
        kind,
        files: total,
        bytes,
        manifest_copy,
    }))
}

fn list(root: &Path, options: &TransferOptions<'_>) -> Result<TreeListing, TransferError> {
    with_retry(&options.retry, root, || list_tree(root))
}

/// Removes a file or a symlink itself, never what the link points to.
fn remove_entry(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        // Windows directory links are removed like directories.
        Err(err) if cfg!(windows) && is_symlink(path) => fs::remove_dir(path).map_err(|_| err),
        other => other,
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_symlink())
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn cancelled(root: &Path, files: &[PathBuf], next: usize) -> TransferOutcome {
    TransferOutcome::Cancelled {
        files_completed: next,
        total_files: files.len(),
        partial_dir: partial_top_level(root, files, next),
    }
}

/// Files are sorted, so a top-level directory is half done exactly when the
/// last finished file and the next pending one share it.
fn partial_top_level(root: &Path, files: &[PathBuf], next: usize) -> Option<PathBuf> {
    if next == 0 || next >= files.len() {
        return None;
    }
    let done = top_level_dir(&files[next - 1])?;
    let pending = top_level_dir(&files[next])?;
    (done == pending).then(|| root.join(done))
}

fn top_level_dir(relative: &Path) -> Option<&Path> {
    let mut components = relative.components();
    let first = components.next()?;
    components.next()?;
    Some(Path::new(first.as_os_str()))
}
