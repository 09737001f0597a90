use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

pub type TransferProgressReporter<'a> = dyn Fn(TransferProgress) + 'a;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferKind {
    Install,
    Update,
    Delete,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Install => "install",
            TransferKind::Update => "update",
            TransferKind::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferProgress {
    pub kind: TransferKind,
    pub percent: u8,
    pub current_file: String,
    pub completed_files: usize,
    pub total_files: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferReport {
    pub kind: TransferKind,
    pub files: usize,
    pub bytes: u64,
    pub manifest_copy: Option<PathBuf>,
}

/// Result of a transfer that did not fail. Cancellation is a clean early
/// exit; `partial_dir` names the top-level directory left half-processed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransferOutcome {
    Completed(TransferReport),
    Cancelled {
        files_completed: usize,
        total_files: usize,
        partial_dir: Option<PathBuf>,
    },
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer failed at {path} after {attempts} attempt(s): {source}")]
    Failed {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            TransferError::Failed { path, .. } => path,
        }
    }
}

/// Shared flag checked before every file operation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total tries per file operation, including the first.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }
}

#[derive(Clone, Copy)]
pub struct TransferOptions<'a> {
    pub retry: RetryPolicy,
    pub progress_interval: Duration,
    pub progress: Option<&'a TransferProgressReporter<'a>>,
    pub cancel: Option<&'a CancelToken>,
}

impl Default for TransferOptions<'_> {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            progress_interval: Duration::from_millis(100),
            progress: None,
            cancel: None,
        }
    }
}

impl TransferOptions<'_> {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy {
            attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(30), Duration::from_millis(350));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
