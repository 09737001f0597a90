use crate::transfer_types::{TransferKind, TransferOptions, TransferProgress};
use std::path::Path;
use std::time::Instant;

/// Rate-limits progress callbacks. The first and last file always report.
pub(crate) struct ProgressEmitter<'a> {
    kind: TransferKind,
    total_files: usize,
    options: TransferOptions<'a>,
    last_emit: Option<Instant>,
}

impl<'a> ProgressEmitter<'a> {
    pub(crate) fn new(kind: TransferKind, total_files: usize, options: TransferOptions<'a>) -> Self {
        Self {
            kind,
            total_files,
            options,
            last_emit: None,
        }
    }

    pub(crate) fn file_done(&mut self, current_file: &Path, completed_files: usize) {
        let Some(report) = self.options.progress else {
            return;
        };
        let is_last = completed_files >= self.total_files;
        let due = self
            .last_emit
            .is_none_or(|last| last.elapsed() >= self.options.progress_interval);
        if !(is_last || due) {
            return;
        }
        self.last_emit = Some(Instant::now());
        report(TransferProgress {
            kind: self.kind,
            percent: percent(completed_files, self.total_files),
            current_file: current_file.display().to_string(),
            completed_files,
            total_files: self.total_files,
        });
    }

    /// Final event for an empty tree, which never reaches `file_done`.
    pub(crate) fn finish_empty(&mut self) {
        if let Some(report) = self.options.progress {
            report(TransferProgress {
                kind: self.kind,
                percent: 100,
                current_file: String::new(),
                completed_files: 0,
                total_files: 0,
            });
        }
    }
}

pub(crate) fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let value = (completed.min(total) as u128 * 100) / total as u128;
    value as u8
}
