use crate::transfer_types::{RetryPolicy, TransferError};
use std::io;
use std::path::Path;
use tracing::warn;

/// Sharing and lock violations reported by Windows.
const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;

pub(crate) fn is_transient(err: &io::Error) -> bool {
    if cfg!(windows)
        && matches!(
            err.raw_os_error(),
            Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION)
        )
    {
        return true;
    }
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
    )
}

/// Runs one file operation, retrying transient failures with backoff until
/// the policy's budget is spent.
pub(crate) fn with_retry<T>(
    policy: &RetryPolicy,
    path: &Path,
    mut operation: impl FnMut() -> io::Result<T>,
) -> Result<T, TransferError> {
    let budget = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < budget && is_transient(&err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    path = %path.display(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient file error; retrying"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(source) => {
                return Err(TransferError::Failed {
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}
